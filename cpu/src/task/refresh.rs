//! The memory refresh task, and the parity task, neither of which
//! has any functions of its own.
use base::prelude::*;

use super::{Cycle, TaskFunctions};
use crate::alarm::Alarm;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct MemoryRefresh;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct Parity;

impl TaskFunctions for MemoryRefresh {
    /// On the Alto I, the refresh task blocks itself with `MAR←R37`
    /// (there is no BLOCK in its microcode).
    fn early_f1(&mut self, cx: &mut Cycle<'_, '_>) -> Result<(), Alarm> {
        if cx.system.is_alto_i()
            && cx.instruction.f1 == SpecialFunction1::LoadMAR
            && cx.rselect == 0o37
        {
            cx.block_self()?;
        }
        Ok(())
    }
}

impl TaskFunctions for Parity {}
