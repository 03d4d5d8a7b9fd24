//! Operation descriptors advertised to hosts.
//!
//! A host embedding this crate publishes operations to its own clients;
//! the catalog tells it what to publish given the engine's availability.

use serde::Serialize;

/// One parameter of an advertised operation.
#[derive(Debug, Clone, Serialize)]
pub struct ParameterDescriptor {
    pub name: &'static str,
    pub description: &'static str,
}

/// One operation a host can offer on this engine's behalf.
#[derive(Debug, Clone, Serialize)]
pub struct OperationDescriptor {
    pub name: &'static str,
    pub title: &'static str,
    pub description: &'static str,
    pub parameters: Vec<ParameterDescriptor>,
    pub result: &'static str,
}

/// Operations to advertise for the given engine availability.
///
/// The version query is always advertised because it degrades to a
/// diagnostic string instead of failing; analysis operations are withheld
/// when the engine cannot run them.
pub fn catalog(available: bool) -> Vec<OperationDescriptor> {
    let mut ops = vec![OperationDescriptor {
        name: "version",
        title: "GRASS Version",
        description: "Retrieve the version of GRASS used for computation",
        parameters: Vec::new(),
        result: "Version",
    }];

    if available {
        ops.push(OperationDescriptor {
            name: "viewshed",
            title: "r.viewshed",
            description: "Computes the viewshed of a point on an elevation raster map.",
            parameters: vec![
                ParameterDescriptor {
                    name: "dem",
                    description: "digital elevation model",
                },
                ParameterDescriptor {
                    name: "x",
                    description: "x location in map units",
                },
                ParameterDescriptor {
                    name: "y",
                    description: "y location in map units",
                },
            ],
            result: "area visible from provided location",
        });
    }

    ops
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_always_advertised() {
        let ops = catalog(false);
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].name, "version");
    }

    #[test]
    fn viewshed_is_gated_on_availability() {
        let ops = catalog(true);
        let names: Vec<_> = ops.iter().map(|op| op.name).collect();
        assert_eq!(names, vec!["version", "viewshed"]);

        let viewshed = &ops[1];
        let params: Vec<_> = viewshed.parameters.iter().map(|p| p.name).collect();
        assert_eq!(params, vec!["dem", "x", "y"]);
    }

    #[test]
    fn descriptors_serialize_for_hosts() {
        let json = serde_json::to_value(catalog(true)).unwrap();
        assert_eq!(json[1]["title"], "r.viewshed");
        assert_eq!(json[1]["parameters"][0]["name"], "dem");
    }
}
