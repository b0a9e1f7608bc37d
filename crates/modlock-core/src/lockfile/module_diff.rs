use super::value::{Lockfile, ResolutionInputs};
use std::collections::BTreeSet;

impl Lockfile {
    /// Reasons the recorded resolution inputs no longer match the current ones
    ///
    /// Empty when the module files, overrides and flags are unchanged.
    pub fn module_and_flags_diff(&self, current: &ResolutionInputs) -> Vec<String> {
        let mut reasons = Vec::new();

        if self.module_file_hash != current.module_file_hash {
            reasons.push("the root module file has been modified".to_string());
        }

        reasons.extend(self.flags.diff(&current.flags));

        let names: BTreeSet<&String> = self
            .local_override_hashes
            .keys()
            .chain(current.local_override_hashes.keys())
            .collect();
        for name in names {
            match (
                self.local_override_hashes.get(name),
                current.local_override_hashes.get(name),
            ) {
                (Some(locked), Some(now)) if locked != now => reasons.push(format!(
                    "the module file has changed for the overridden module: {}",
                    name
                )),
                (Some(_), None) => reasons.push(format!(
                    "the module '{}' is no longer locally overridden",
                    name
                )),
                (None, Some(_)) => {
                    reasons.push(format!("the module '{}' is now locally overridden", name))
                }
                _ => {}
            }
        }

        reasons
    }
}
