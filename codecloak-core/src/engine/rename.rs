//! Choosing new names for program bindings

use super::names::NameGenerator;
use super::scope::{Analysis, BindingId, PRESERVED_NAMES};
use super::settings::EngineSettings;
use rand::Rng;
use std::collections::HashMap;
use tracing::debug;

/// New name for every binding that may be renamed. Free names never appear.
pub type Renames = HashMap<BindingId, String>;

pub fn plan<R: Rng>(
    analysis: &Analysis,
    settings: &EngineSettings,
    names: &mut NameGenerator,
    rng: &mut R,
) -> Renames {
    let mut renames = Renames::new();
    if analysis.dynamic_scope {
        debug!("program uses eval or with; identifiers are kept");
        return renames;
    }

    for (id, binding) in analysis.bindings.iter().enumerate() {
        if is_kept(&binding.name, analysis, settings) {
            continue;
        }
        renames.insert(id, names.next(rng));
    }
    renames
}

fn is_kept(name: &str, analysis: &Analysis, settings: &EngineSettings) -> bool {
    PRESERVED_NAMES.contains(&name)
        || analysis.module_names.contains(name)
        || name.contains('\\')
        || settings.reserved_names.iter().any(|re| re.is_match(name))
}
