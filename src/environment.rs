//! Session environment derivation.
//!
//! The engine runs headless only when a handful of variables point it at
//! its install and at a session resource file. The derivation is a pure
//! function over an explicit base environment so the per-family branches
//! are testable without touching this process's environment, which is
//! never mutated.

use std::collections::HashMap;
use std::path::Path;

use crate::platform::OsFamily;
use crate::workspace::{Workspace, PERMANENT_MAPSET};

/// Version tag of the engine generation this crate drives. Appears in the
/// session environment and in the resource file name.
pub const GRASS_VERSION: &str = "7.0.0";

/// Build the complete child environment for one request: snapshot this
/// process's environment, write the session resource file, and merge in the
/// derived variables.
///
/// The only failure mode is writing the resource file. The returned map is
/// built once per request and reused unchanged for every module command.
pub fn build(
    exec: &Path,
    family: OsFamily,
    workspace: &Workspace,
) -> std::io::Result<HashMap<String, String>> {
    write_rc_file(workspace)?;
    let base: HashMap<String, String> = std::env::vars().collect();
    Ok(derive(&base, exec, family, workspace))
}

/// Derive the session environment from an explicit base.
///
/// Sets `GISBASE` (the install root, parent of the launcher), the version
/// tag, and `GISRC`; appends the install's `bin` and `scripts` directories
/// to `PATH`; and extends the family's dynamic-linker variable with `lib`,
/// preserving any existing value. Windows has no separate linker variable,
/// so `lib` joins `PATH` there.
pub fn derive(
    base: &HashMap<String, String>,
    exec: &Path,
    family: OsFamily,
    workspace: &Workspace,
) -> HashMap<String, String> {
    let mut env = base.clone();

    let gisbase = exec.parent().unwrap_or_else(|| Path::new(""));
    env.insert("GISBASE".to_string(), gisbase.display().to_string());
    env.insert("GRASS_VERSION".to_string(), GRASS_VERSION.to_string());
    env.insert(
        "GISRC".to_string(),
        workspace.rc_file().display().to_string(),
    );

    let sep = family.path_separator();
    let bin = gisbase.join("bin").display().to_string();
    let scripts = gisbase.join("scripts").display().to_string();
    let lib = gisbase.join("lib").display().to_string();

    let path = match family {
        OsFamily::Windows => append_entries(base.get("PATH"), &[&bin, &scripts, &lib], sep),
        _ => append_entries(base.get("PATH"), &[&bin, &scripts], sep),
    };
    env.insert("PATH".to_string(), path);

    if let Some(var) = family.shared_library_var() {
        env.insert(
            var.to_string(),
            append_entries(base.get(var), &[&lib], sep),
        );
    }

    env
}

/// Write the engine's session resource file: four fixed lines naming the
/// geodatabase, the location, the mapset, and the non-interactive UI.
fn write_rc_file(workspace: &Workspace) -> std::io::Result<()> {
    let contents = format!(
        "GISDBASE: {}\nLOCATION_NAME: {}\nMAPSET: {}\nGRASS_GUI: text\n",
        workspace.geodb().display(),
        workspace.location_name(),
        PERMANENT_MAPSET,
    );
    std::fs::write(workspace.rc_file(), contents)
}

fn append_entries(existing: Option<&String>, entries: &[&str], sep: char) -> String {
    let mut value = existing.cloned().unwrap_or_default();
    for entry in entries {
        if !value.is_empty() {
            value.push(sep);
        }
        value.push_str(entry);
    }
    value
}
