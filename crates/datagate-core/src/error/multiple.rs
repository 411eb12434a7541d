use super::Error;

#[derive(Debug)]
pub(super) struct MultipleErrors {
    pub(super) errors: Vec<Error>,
}

impl std::error::Error for MultipleErrors {}

impl core::fmt::Display for MultipleErrors {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        write!(f, "Multiple errors: {}", self.errors.len())?;
        for err in &self.errors {
            write!(f, "; {err}")?;
        }
        Ok(())
    }
}
