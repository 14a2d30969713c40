use crate::basic_types::HashMap;
use crate::engine::variables::PropositionalVariable;

/// Names of problem variables, for logging and dumps.
#[derive(Default, Debug)]
pub(crate) struct VariableNames {
    names: HashMap<PropositionalVariable, String>,
}

impl VariableNames {
    /// The name of the variable, or `None` if it was never named.
    pub(crate) fn get_name(&self, variable: PropositionalVariable) -> Option<&str> {
        self.names.get(&variable).map(|name| name.as_str())
    }

    pub(crate) fn add(&mut self, variable: PropositionalVariable, name: String) {
        let _ = self.names.insert(variable, name);
    }
}
