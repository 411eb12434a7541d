use datagate::{Driver, Memory, Result};

use crate::Setup;

pub struct SetupMemory;

impl Setup for SetupMemory {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn driver(&self) -> Result<Box<dyn Driver>> {
        Ok(Box::new(Memory::new()))
    }
}
