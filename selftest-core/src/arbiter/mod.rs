//! Test-mode arbitration between bench routines and live remote control.

use crate::link::LinkStatus;

/// Arming decision for one scheduler tick.
///
/// Only [`evaluate`] can produce a value, so the sequencer cannot be stepped
/// with a decision that did not come from the arbiter.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Armed(bool);

impl Armed {
    pub const fn is_armed(self) -> bool {
        self.0
    }
}

/// Bench routines may run only when the operator asked for them and nobody
/// holds the remote-control link.
pub const fn evaluate(test_mode_request: bool, link: LinkStatus) -> Armed {
    Armed(test_mode_request && matches!(link, LinkStatus::Disconnected))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truth_table() {
        let cases = [
            (false, LinkStatus::Connected, false),
            (false, LinkStatus::Disconnected, false),
            (true, LinkStatus::Connected, false),
            (true, LinkStatus::Disconnected, true),
        ];

        for (request, link, expected) in cases {
            assert_eq!(
                evaluate(request, link).is_armed(),
                expected,
                "request={request} link={link}"
            );
        }
    }

    #[test]
    fn usable_in_const_context() {
        const ARMED: Armed = evaluate(true, LinkStatus::Disconnected);
        assert!(ARMED.is_armed());
    }
}
