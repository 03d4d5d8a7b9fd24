//! Raster values and the collaborator seams around them.
//!
//! The pipeline shuttles rasters between the caller and the engine as
//! encoded files; it never interprets the bytes itself. Hosts with real
//! geospatial stacks plug in their own [`RasterCodec`] and [`CrsLabeler`].

use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum RasterError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("raster carries no coordinate reference system")]
    MissingCrs,
}

/// An encoded raster: GeoTIFF payload bytes plus the spatial reference its
/// producer declared, when known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Raster {
    data: Vec<u8>,
    epsg: Option<u32>,
}

impl Raster {
    pub fn new(data: Vec<u8>) -> Self {
        Self { data, epsg: None }
    }

    pub fn with_epsg(data: Vec<u8>, epsg: u32) -> Self {
        Self {
            data,
            epsg: Some(epsg),
        }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn epsg(&self) -> Option<u32> {
        self.epsg
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Reads and writes encoded rasters at filesystem paths.
pub trait RasterCodec: Send + Sync {
    fn read(&self, path: &Path) -> Result<Raster, RasterError>;
    fn write(&self, path: &Path, raster: &Raster) -> Result<(), RasterError>;
}

/// Passthrough codec. The engine's import and export modules already speak
/// GeoTIFF, so staging a raster means copying its encoded bytes to and from
/// disk unchanged.
pub struct GeoTiffCodec;

impl RasterCodec for GeoTiffCodec {
    fn read(&self, path: &Path) -> Result<Raster, RasterError> {
        Ok(Raster::new(std::fs::read(path)?))
    }

    fn write(&self, path: &Path, raster: &Raster) -> Result<(), RasterError> {
        std::fs::write(path, raster.data())?;
        Ok(())
    }
}

/// Produces the spatial reference code used to key an engine location.
pub trait CrsLabeler: Send + Sync {
    fn spatial_reference_code(&self, raster: &Raster) -> Result<String, RasterError>;
}

/// Labels rasters by the EPSG code their producer declared.
pub struct DeclaredCrs;

impl CrsLabeler for DeclaredCrs {
    fn spatial_reference_code(&self, raster: &Raster) -> Result<String, RasterError> {
        raster
            .epsg()
            .map(|code| code.to_string())
            .ok_or(RasterError::MissingCrs)
    }
}
