//! User-defined managers attached to a world

use anyhow::Result;

use super::AsAny;

/// Long-lived service owned by the world, one instance per type
///
/// Managers are initialized when added and disposed when removed or when
/// the world is disposed.
pub trait Manager: AsAny {
    fn initialize(&mut self) -> Result<()> {
        Ok(())
    }

    fn dispose(&mut self) -> Result<()> {
        Ok(())
    }
}
