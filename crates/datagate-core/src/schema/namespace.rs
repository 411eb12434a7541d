use super::ModelId;

/// A node of the namespace tree. The root is named `""`.
#[derive(Debug, Default)]
pub struct Namespace {
    pub name: String,
    pub title: String,
    pub description: String,
    pub parent: Option<String>,

    /// Names of direct child namespaces
    pub children: Vec<String>,

    /// Models declared directly in this namespace
    pub models: Vec<ModelId>,
}

impl Namespace {
    pub fn is_root(&self) -> bool {
        self.name.is_empty()
    }
}
