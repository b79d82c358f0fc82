//! Self-test state machine stepped once per scheduler tick.
//!
//! The sequencer owns the [`SelfTestPhase`] and the phase-local progress
//! (current sweep step and its deadline). It never blocks: each call to
//! [`SelfTestSequencer::step`] inspects the arming decision and the current
//! instant, performs at most a bounded amount of work, and returns a
//! [`StepReport`] describing what happened.
//!
//! Losing the arming decision always wins over every other input. The
//! actuator receives a neutral command at construction and exactly once on
//! every transition into [`SelfTestPhase::Idle`]. A sweep profile that fails
//! [`SweepProfile::validate`] is never driven: every arming edge is refused
//! with [`FailureReason::InvalidProfile`].

use core::{fmt, ops::Add, time::Duration};

use crate::arbiter::Armed;
use crate::sequences::{
    ProfileError, PulseWidth, PwmChannel, SelfTestPhase, SweepProfile, SweepStep,
};

/// Abstraction over the PWM outputs exercised during the sweep.
pub trait ActuatorDriver {
    /// Drives `channel` with the requested pulse width.
    fn set_duty_cycle(&mut self, channel: PwmChannel, pulse: PulseWidth);

    /// Returns every bench output to its safe neutral level.
    fn command_neutral(&mut self);
}

/// Actuator driver that performs no hardware interaction.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoopActuatorDriver;

impl NoopActuatorDriver {
    pub const fn new() -> Self {
        Self
    }
}

impl ActuatorDriver for NoopActuatorDriver {
    fn set_duty_cycle(&mut self, _: PwmChannel, _: PulseWidth) {}

    fn command_neutral(&mut self) {}
}

impl<T: ActuatorDriver + ?Sized> ActuatorDriver for &mut T {
    fn set_duty_cycle(&mut self, channel: PwmChannel, pulse: PulseWidth) {
        (**self).set_duty_cycle(channel, pulse);
    }

    fn command_neutral(&mut self) {
        (**self).command_neutral();
    }
}

/// The kinematics solver could not obtain storage for its matrices.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AllocationError {
    /// Matrix storage is unavailable.
    StorageUnavailable,
}

impl fmt::Display for AllocationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AllocationError::StorageUnavailable => f.write_str("matrix storage unavailable"),
        }
    }
}

/// Inverse-kinematics collaborator initialized after the actuator sweep.
pub trait KinematicsSolver {
    /// (Re)initializes the solver matrices.
    fn initialize_matrices(&mut self) -> Result<(), AllocationError>;
}

/// Solver stand-in whose initialization always succeeds.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoopKinematicsSolver;

impl NoopKinematicsSolver {
    pub const fn new() -> Self {
        Self
    }
}

impl KinematicsSolver for NoopKinematicsSolver {
    fn initialize_matrices(&mut self) -> Result<(), AllocationError> {
        Ok(())
    }
}

impl<T: KinematicsSolver + ?Sized> KinematicsSolver for &mut T {
    fn initialize_matrices(&mut self) -> Result<(), AllocationError> {
        (**self).initialize_matrices()
    }
}

/// Why a self-test run was abandoned.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FailureReason {
    AllocationFailed,
    InvalidTransition,
    /// The configured sweep profile leaves the bounded test range.
    InvalidProfile,
}

impl FailureReason {
    pub const fn label(self) -> &'static str {
        match self {
            FailureReason::AllocationFailed => "allocation-failed",
            FailureReason::InvalidTransition => "invalid-transition",
            FailureReason::InvalidProfile => "invalid-profile",
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Failure surfaced to telemetry when a run aborts back to idle.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SelfTestFailure {
    pub phase: SelfTestPhase,
    pub reason: FailureReason,
}

impl SelfTestFailure {
    pub const fn new(phase: SelfTestPhase, reason: FailureReason) -> Self {
        Self { phase, reason }
    }
}

/// Failure reported when attempting an invalid phase transition.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct TransitionError {
    pub from: SelfTestPhase,
    pub to: SelfTestPhase,
}

impl TransitionError {
    pub const fn new(from: SelfTestPhase, to: SelfTestPhase) -> Self {
        Self { from, to }
    }
}

impl fmt::Display for TransitionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid self-test transition {} -> {}", self.from, self.to)
    }
}

/// Net phase change observed during one step.
///
/// A sweep whose matrix initialization fails passes through
/// `KinematicsInit` and is reported as a single `ActuatorSweep -> Idle`.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct PhaseTransition {
    pub from: SelfTestPhase,
    pub to: SelfTestPhase,
}

/// Outcome of a single [`SelfTestSequencer::step`] call.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct StepReport {
    /// Phase after the step.
    pub phase: SelfTestPhase,
    pub transition: Option<PhaseTransition>,
    pub failure: Option<SelfTestFailure>,
    /// `true` when the actuator received a neutral command during the step.
    ///
    /// A sweep that ends in a failed matrix initialization sends two: one at
    /// the end of the sweep and one on the fall back to idle.
    pub neutral_issued: bool,
}

impl StepReport {
    const fn new(phase: SelfTestPhase) -> Self {
        Self {
            phase,
            transition: None,
            failure: None,
            neutral_issued: false,
        }
    }

    /// Phase entered during the step, if any.
    pub fn entered(&self) -> Option<SelfTestPhase> {
        self.transition.map(|transition| transition.to)
    }
}

/// Bench self-test state machine.
pub struct SelfTestSequencer<I, A, K> {
    profile: SweepProfile,
    profile_error: Option<ProfileError>,
    actuator: A,
    solver: K,
    phase: SelfTestPhase,
    step_index: Option<usize>,
    step_deadline: Option<I>,
    matrices_ready: bool,
    previously_armed: bool,
    reset_pending: bool,
    neutral_commands: u32,
    runs_completed: u32,
    failures: u32,
}

impl<I, A, K> SelfTestSequencer<I, A, K>
where
    I: Copy + Ord + Add<Duration, Output = I>,
    A: ActuatorDriver,
    K: KinematicsSolver,
{
    /// Creates an idle sequencer and drives the actuator to neutral.
    ///
    /// `profile` is validated here; an invalid profile leaves the sequencer
    /// permanently idle (see [`Self::profile_error`]).
    pub fn new(profile: SweepProfile, mut actuator: A, solver: K) -> Self {
        actuator.command_neutral();

        Self {
            profile,
            profile_error: profile.validate().err(),
            actuator,
            solver,
            phase: SelfTestPhase::Idle,
            step_index: None,
            step_deadline: None,
            matrices_ready: false,
            previously_armed: false,
            reset_pending: false,
            neutral_commands: 1,
            runs_completed: 0,
            failures: 0,
        }
    }

    /// Advances the state machine by one tick.
    pub fn step(&mut self, armed: Armed, now: I) -> StepReport {
        let start = self.phase;
        let mut report = StepReport::new(start);
        let mut transitioned = false;

        let is_armed = armed.is_armed();
        let rising_edge = is_armed && !self.previously_armed;
        self.previously_armed = is_armed;
        let reset = core::mem::take(&mut self.reset_pending);

        if is_armed && reset && !rising_edge {
            // Back to idle; only a fresh arming edge starts the next run.
            transitioned |= self.enter_idle(&mut report);
        } else if is_armed {
            transitioned |= match self.phase {
                SelfTestPhase::Idle if rising_edge => self.begin_sweep(now, &mut report),
                SelfTestPhase::Idle | SelfTestPhase::Done => false,
                SelfTestPhase::ActuatorSweep => self.advance_sweep(now, &mut report),
                SelfTestPhase::KinematicsInit if self.matrices_ready => {
                    self.runs_completed = self.runs_completed.saturating_add(1);
                    self.transition_to(SelfTestPhase::Done, &mut report)
                }
                SelfTestPhase::KinematicsInit => false,
            };
        } else {
            // Preemption: pending resets are dropped along with the run.
            transitioned |= self.enter_idle(&mut report);
        }

        report.phase = self.phase;
        if transitioned {
            report.transition = Some(PhaseTransition {
                from: start,
                to: self.phase,
            });
        }
        report
    }

    /// Requests that the next step abandon the current run and return to idle.
    ///
    /// The next run starts on the following arming edge.
    pub fn request_reset(&mut self) {
        self.reset_pending = true;
    }

    /// Moves to `next` if the transition table allows it.
    fn set_phase(&mut self, next: SelfTestPhase) -> Result<(), TransitionError> {
        if self.phase.can_transition_to(next) {
            self.phase = next;
            Ok(())
        } else {
            Err(TransitionError::new(self.phase, next))
        }
    }

    pub const fn phase(&self) -> SelfTestPhase {
        self.phase
    }

    pub const fn profile(&self) -> &SweepProfile {
        &self.profile
    }

    /// Why the configured profile was rejected, if it was.
    pub const fn profile_error(&self) -> Option<ProfileError> {
        self.profile_error
    }

    /// Index of the sweep step currently applied.
    pub const fn step_index(&self) -> Option<usize> {
        self.step_index
    }

    pub const fn step_deadline(&self) -> Option<I> {
        self.step_deadline
    }

    pub const fn reset_pending(&self) -> bool {
        self.reset_pending
    }

    /// Neutral commands issued since construction, including the boot command.
    pub const fn neutral_commands(&self) -> u32 {
        self.neutral_commands
    }

    pub const fn runs_completed(&self) -> u32 {
        self.runs_completed
    }

    pub const fn failures(&self) -> u32 {
        self.failures
    }

    pub fn actuator(&self) -> &A {
        &self.actuator
    }

    pub fn actuator_mut(&mut self) -> &mut A {
        &mut self.actuator
    }

    pub fn solver(&self) -> &K {
        &self.solver
    }

    pub fn solver_mut(&mut self) -> &mut K {
        &mut self.solver
    }

    /// Applies a validated transition. A transition the table rejects clamps
    /// the sequencer to idle and is reported as a failure.
    fn transition_to(&mut self, next: SelfTestPhase, report: &mut StepReport) -> bool {
        match self.set_phase(next) {
            Ok(()) => {
                if next == SelfTestPhase::Idle {
                    self.settle_idle(report);
                }
            }
            Err(error) => {
                if self.phase != SelfTestPhase::Idle {
                    self.phase = SelfTestPhase::Idle;
                    self.settle_idle(report);
                }
                self.fail(
                    SelfTestFailure::new(error.from, FailureReason::InvalidTransition),
                    report,
                );
            }
        }

        true
    }

    fn enter_idle(&mut self, report: &mut StepReport) -> bool {
        if self.phase == SelfTestPhase::Idle {
            return false;
        }
        self.transition_to(SelfTestPhase::Idle, report)
    }

    fn settle_idle(&mut self, report: &mut StepReport) {
        self.step_index = None;
        self.step_deadline = None;
        self.matrices_ready = false;
        self.issue_neutral(report);
    }

    fn issue_neutral(&mut self, report: &mut StepReport) {
        self.actuator.command_neutral();
        self.neutral_commands = self.neutral_commands.saturating_add(1);
        report.neutral_issued = true;
    }

    fn fail(&mut self, failure: SelfTestFailure, report: &mut StepReport) {
        self.failures = self.failures.saturating_add(1);
        report.failure = Some(failure);
    }

    fn begin_sweep(&mut self, now: I, report: &mut StepReport) -> bool {
        if self.profile_error.is_some() {
            self.fail(
                SelfTestFailure::new(SelfTestPhase::Idle, FailureReason::InvalidProfile),
                report,
            );
            return false;
        }

        self.transition_to(SelfTestPhase::ActuatorSweep, report);

        match self.profile.steps().first() {
            Some(step) => {
                let step = *step;
                self.apply_step(0, step, now);
            }
            None => self.finish_sweep(report),
        }

        true
    }

    fn advance_sweep(&mut self, now: I, report: &mut StepReport) -> bool {
        let (Some(index), Some(deadline)) = (self.step_index, self.step_deadline) else {
            self.finish_sweep(report);
            return true;
        };

        if now < deadline {
            return false;
        }

        let next = index + 1;
        if let Some(step) = self.profile.steps().get(next) {
            let step = *step;
            self.apply_step(next, step, now);
            false
        } else {
            self.finish_sweep(report);
            true
        }
    }

    fn apply_step(&mut self, index: usize, step: SweepStep, now: I) {
        self.actuator.set_duty_cycle(step.channel, step.pulse);
        self.step_index = Some(index);
        self.step_deadline = Some(now + step.hold_duration());
    }

    fn finish_sweep(&mut self, report: &mut StepReport) {
        self.step_index = None;
        self.step_deadline = None;
        self.issue_neutral(report);
        self.transition_to(SelfTestPhase::KinematicsInit, report);

        match self.solver.initialize_matrices() {
            Ok(()) => self.matrices_ready = true,
            Err(_) => {
                self.fail(
                    SelfTestFailure::new(
                        SelfTestPhase::KinematicsInit,
                        FailureReason::AllocationFailed,
                    ),
                    report,
                );
                self.enter_idle(report);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arbiter::evaluate;
    use crate::link::LinkStatus;
    use crate::sequences::DUCT_FAN_SWEEP_PROFILE;
    use heapless::Vec;

    #[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
    struct MockInstant(u64);

    impl MockInstant {
        fn millis(value: u64) -> Self {
            Self(value * 1_000)
        }
    }

    impl Add<Duration> for MockInstant {
        type Output = Self;

        fn add(self, rhs: Duration) -> Self::Output {
            Self(self.0 + u64::try_from(rhs.as_micros()).unwrap())
        }
    }

    #[derive(Default)]
    struct RecordingActuator {
        pulses: Vec<u16, 32>,
        neutral: u32,
    }

    impl ActuatorDriver for RecordingActuator {
        fn set_duty_cycle(&mut self, _: PwmChannel, pulse: PulseWidth) {
            self.pulses.push(pulse.as_micros()).unwrap();
        }

        fn command_neutral(&mut self) {
            self.neutral += 1;
        }
    }

    struct FlakySolver {
        fail: bool,
        calls: u32,
    }

    impl KinematicsSolver for FlakySolver {
        fn initialize_matrices(&mut self) -> Result<(), AllocationError> {
            self.calls += 1;
            if self.fail {
                Err(AllocationError::StorageUnavailable)
            } else {
                Ok(())
            }
        }
    }

    fn armed() -> Armed {
        evaluate(true, LinkStatus::Disconnected)
    }

    fn disarmed() -> Armed {
        evaluate(true, LinkStatus::Connected)
    }

    fn sequencer(fail: bool) -> SelfTestSequencer<MockInstant, RecordingActuator, FlakySolver> {
        SelfTestSequencer::new(
            DUCT_FAN_SWEEP_PROFILE,
            RecordingActuator::default(),
            FlakySolver { fail, calls: 0 },
        )
    }

    #[test]
    fn construction_commands_neutral_once() {
        let sequencer = sequencer(false);
        assert_eq!(sequencer.phase(), SelfTestPhase::Idle);
        assert_eq!(sequencer.actuator().neutral, 1);
        assert_eq!(sequencer.neutral_commands(), 1);
    }

    #[test]
    fn sweep_walks_profile_on_deadlines() {
        let mut sequencer = sequencer(false);

        let report = sequencer.step(armed(), MockInstant::millis(0));
        assert_eq!(report.phase, SelfTestPhase::ActuatorSweep);
        assert_eq!(sequencer.step_index(), Some(0));
        assert_eq!(sequencer.step_deadline(), Some(MockInstant::millis(250)));

        let report = sequencer.step(armed(), MockInstant::millis(249));
        assert_eq!(report.transition, None);
        assert_eq!(sequencer.step_index(), Some(0));

        sequencer.step(armed(), MockInstant::millis(250));
        assert_eq!(sequencer.step_index(), Some(1));
        assert_eq!(sequencer.step_deadline(), Some(MockInstant::millis(500)));

        assert_eq!(sequencer.actuator().pulses.as_slice(), &[1_000, 1_250]);
    }

    #[test]
    fn kinematics_success_reaches_done_on_following_step() {
        let mut sequencer = sequencer(false);
        sequencer.step(armed(), MockInstant::millis(0));
        for step in 1..=4 {
            sequencer.step(armed(), MockInstant::millis(step * 250));
        }
        assert_eq!(sequencer.phase(), SelfTestPhase::ActuatorSweep);

        let report = sequencer.step(armed(), MockInstant::millis(1_250));
        assert_eq!(report.phase, SelfTestPhase::KinematicsInit);
        assert!(report.neutral_issued);
        assert_eq!(sequencer.solver().calls, 1);

        let report = sequencer.step(armed(), MockInstant::millis(1_260));
        assert_eq!(report.phase, SelfTestPhase::Done);
        assert_eq!(sequencer.runs_completed(), 1);

        sequencer.step(armed(), MockInstant::millis(1_270));
        assert_eq!(sequencer.phase(), SelfTestPhase::Done);
        assert_eq!(sequencer.solver().calls, 1);
    }

    #[test]
    fn set_phase_rejects_skipping_phases() {
        let mut sequencer = sequencer(false);

        assert_eq!(
            sequencer.set_phase(SelfTestPhase::Done),
            Err(TransitionError::new(SelfTestPhase::Idle, SelfTestPhase::Done))
        );
        assert_eq!(sequencer.phase(), SelfTestPhase::Idle);
        assert_eq!(sequencer.set_phase(SelfTestPhase::ActuatorSweep), Ok(()));
    }

    #[test]
    fn rejected_transition_clamps_to_idle_and_fails() {
        let mut sequencer = sequencer(false);
        sequencer.step(armed(), MockInstant::millis(0));
        let neutral_before = sequencer.actuator().neutral;

        let mut report = StepReport::new(sequencer.phase());
        assert!(sequencer.transition_to(SelfTestPhase::Done, &mut report));

        assert_eq!(sequencer.phase(), SelfTestPhase::Idle);
        assert_eq!(sequencer.step_index(), None);
        assert_eq!(
            report.failure,
            Some(SelfTestFailure::new(
                SelfTestPhase::ActuatorSweep,
                FailureReason::InvalidTransition
            ))
        );
        assert!(report.neutral_issued);
        assert_eq!(sequencer.actuator().neutral, neutral_before + 1);
        assert_eq!(sequencer.failures(), 1);
    }

    #[test]
    fn rejected_transition_from_idle_stays_put() {
        let mut sequencer = sequencer(false);

        let mut report = StepReport::new(sequencer.phase());
        sequencer.transition_to(SelfTestPhase::KinematicsInit, &mut report);

        assert_eq!(sequencer.phase(), SelfTestPhase::Idle);
        assert!(!report.neutral_issued);
        assert_eq!(
            report.failure.map(|failure| failure.reason),
            Some(FailureReason::InvalidTransition)
        );
    }

    #[test]
    fn failed_run_waits_for_new_arming_edge() {
        let mut sequencer = sequencer(true);
        sequencer.step(armed(), MockInstant::millis(0));
        for step in 1..=5 {
            sequencer.step(armed(), MockInstant::millis(step * 250));
        }
        assert_eq!(sequencer.phase(), SelfTestPhase::Idle);
        assert_eq!(sequencer.failures(), 1);

        let report = sequencer.step(armed(), MockInstant::millis(1_300));
        assert_eq!(report.phase, SelfTestPhase::Idle);
        assert_eq!(report.transition, None);

        sequencer.request_reset();
        let report = sequencer.step(armed(), MockInstant::millis(1_310));
        assert_eq!(report.phase, SelfTestPhase::Idle);
        assert!(!sequencer.reset_pending());

        sequencer.step(disarmed(), MockInstant::millis(1_320));
        let report = sequencer.step(armed(), MockInstant::millis(1_330));
        assert_eq!(report.phase, SelfTestPhase::ActuatorSweep);
    }

    #[test]
    fn reset_on_the_arming_edge_still_starts_a_run() {
        let mut sequencer = sequencer(false);
        sequencer.request_reset();
        let report = sequencer.step(armed(), MockInstant::millis(0));
        assert_eq!(report.phase, SelfTestPhase::ActuatorSweep);
        assert!(!sequencer.reset_pending());
    }

    #[test]
    fn allocation_failure_sends_neutral_at_sweep_end_and_on_idle_entry() {
        let mut sequencer = sequencer(true);
        sequencer.step(armed(), MockInstant::millis(0));
        for step in 1..=4 {
            sequencer.step(armed(), MockInstant::millis(step * 250));
        }
        let neutral_before = sequencer.actuator().neutral;

        let report = sequencer.step(armed(), MockInstant::millis(1_250));
        assert_eq!(report.phase, SelfTestPhase::Idle);
        assert!(report.neutral_issued);
        assert_eq!(sequencer.actuator().neutral, neutral_before + 2);
    }

    #[test]
    fn out_of_range_profile_is_never_driven() {
        const HOT: [SweepStep; 1] = [SweepStep::new(
            PwmChannel::new(0),
            PulseWidth::from_micros(2_000),
            Duration::from_millis(10),
        )];
        let profile = SweepProfile::new(
            &HOT,
            PulseWidth::from_micros(1_000),
            PulseWidth::from_micros(1_500),
        );
        let mut sequencer = SelfTestSequencer::new(
            profile,
            RecordingActuator::default(),
            FlakySolver {
                fail: false,
                calls: 0,
            },
        );
        assert_eq!(
            sequencer.profile_error(),
            Some(ProfileError::ExceedsTestLimit {
                index: 0,
                pulse: PulseWidth::from_micros(2_000),
            })
        );

        let report = sequencer.step(armed(), MockInstant::millis(0));
        assert_eq!(report.phase, SelfTestPhase::Idle);
        assert_eq!(report.transition, None);
        assert_eq!(
            report.failure,
            Some(SelfTestFailure::new(
                SelfTestPhase::Idle,
                FailureReason::InvalidProfile
            ))
        );

        for tick in 1..=10 {
            let report = sequencer.step(armed(), MockInstant::millis(tick * 10));
            assert_eq!(report.failure, None);
        }
        assert!(sequencer.actuator().pulses.is_empty());
        assert_eq!(sequencer.solver().calls, 0);
        assert_eq!(sequencer.failures(), 1);
    }

    #[test]
    fn disarm_during_kinematics_init_returns_to_idle() {
        let mut sequencer = sequencer(false);
        sequencer.step(armed(), MockInstant::millis(0));
        for step in 1..=5 {
            sequencer.step(armed(), MockInstant::millis(step * 250));
        }
        assert_eq!(sequencer.phase(), SelfTestPhase::KinematicsInit);
        let neutral_before = sequencer.actuator().neutral;

        let report = sequencer.step(disarmed(), MockInstant::millis(1_260));
        assert_eq!(report.phase, SelfTestPhase::Idle);
        assert!(report.neutral_issued);
        assert_eq!(sequencer.actuator().neutral, neutral_before + 1);
    }
}
