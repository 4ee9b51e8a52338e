/// Interrupt lines the HLE kernel services itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InterruptName {
    /// Per-core physical timer (GIC PPI 30).
    NonSecurePhysicalTimer,
}

impl InterruptName {
    pub const fn line(self) -> u32 {
        match self {
            InterruptName::NonSecurePhysicalTimer => 30,
        }
    }
}

/// Boundary to the (virtual) interrupt controller.
pub trait InterruptController: Send + Sync {
    /// Clear `name` on `core_id` after the interrupt has been serviced.
    fn clear_interrupt(&self, name: InterruptName, core_id: usize);
}

/// Controller that ignores every request. Used until a real interrupt manager is wired up.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullInterruptController;

impl InterruptController for NullInterruptController {
    fn clear_interrupt(&self, _name: InterruptName, _core_id: usize) {}
}
