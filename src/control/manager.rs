use tracing::debug;

// ---------------------------------------------------------------------------
// Mode bookkeeping
// ---------------------------------------------------------------------------

/// The five autopilot modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeKind {
    OrientationMatch,
    CancelRotation,
    PointToPosition,
    CancelLinearMotion,
    GoToPosition,
}

impl ModeKind {
    /// Rotational modes steer attitude; translational modes steer position.
    /// The two groups are independently mutually exclusive.
    pub fn is_rotational(self) -> bool {
        matches!(
            self,
            ModeKind::OrientationMatch | ModeKind::CancelRotation | ModeKind::PointToPosition
        )
    }
}

/// Activation flags for every mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ModeSet {
    pub orientation_match: bool,
    pub cancel_rotation: bool,
    pub point_to_position: bool,
    pub cancel_linear_motion: bool,
    pub go_to_position: bool,
}

impl ModeSet {
    pub fn get(&self, mode: ModeKind) -> bool {
        match mode {
            ModeKind::OrientationMatch => self.orientation_match,
            ModeKind::CancelRotation => self.cancel_rotation,
            ModeKind::PointToPosition => self.point_to_position,
            ModeKind::CancelLinearMotion => self.cancel_linear_motion,
            ModeKind::GoToPosition => self.go_to_position,
        }
    }

    fn set(&mut self, mode: ModeKind, on: bool) {
        match mode {
            ModeKind::OrientationMatch => self.orientation_match = on,
            ModeKind::CancelRotation => self.cancel_rotation = on,
            ModeKind::PointToPosition => self.point_to_position = on,
            ModeKind::CancelLinearMotion => self.cancel_linear_motion = on,
            ModeKind::GoToPosition => self.go_to_position = on,
        }
    }

    /// The single active rotational mode, if any.
    pub fn active_rotational(&self) -> Option<ModeKind> {
        if self.orientation_match {
            Some(ModeKind::OrientationMatch)
        } else if self.cancel_rotation {
            Some(ModeKind::CancelRotation)
        } else if self.point_to_position {
            Some(ModeKind::PointToPosition)
        } else {
            None
        }
    }

    /// The single active translational mode, if any.
    pub fn active_translational(&self) -> Option<ModeKind> {
        if self.cancel_linear_motion {
            Some(ModeKind::CancelLinearMotion)
        } else if self.go_to_position {
            Some(ModeKind::GoToPosition)
        } else {
            None
        }
    }
}

/// Receives a callback on every mode transition.
pub trait ModeObserver {
    fn mode_changed(&mut self, mode: ModeKind, active: bool);
}

const ROTATIONAL: [ModeKind; 3] = [
    ModeKind::OrientationMatch,
    ModeKind::CancelRotation,
    ModeKind::PointToPosition,
];
const TRANSLATIONAL: [ModeKind; 2] = [ModeKind::CancelLinearMotion, ModeKind::GoToPosition];

/// Enforces mutual exclusion inside the rotational and translational groups.
///
/// Enabling a mode first disables every other member of its group; disabling
/// is a plain clear. Every transition is reported to the observer.
#[derive(Default)]
pub struct ModeManager {
    active: ModeSet,
    observer: Option<Box<dyn ModeObserver>>,
}

impl std::fmt::Debug for ModeManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModeManager").field("active", &self.active).finish()
    }
}

impl ModeManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active(&self) -> ModeSet {
        self.active
    }

    /// Restore a previously captured activation set without exclusivity
    /// processing (used by the auto-tuner to put things back exactly).
    pub fn restore(&mut self, set: ModeSet) {
        self.active = set;
    }

    pub fn set_observer(&mut self, observer: Option<Box<dyn ModeObserver>>) {
        self.observer = observer;
    }

    pub fn enable(&mut self, mode: ModeKind, on: bool) {
        if on {
            let group: &[ModeKind] =
                if mode.is_rotational() { &ROTATIONAL } else { &TRANSLATIONAL };
            for &other in group {
                if other != mode && self.active.get(other) {
                    self.transition(other, false);
                }
            }
        }
        if self.active.get(mode) != on {
            self.transition(mode, on);
        }
    }

    fn transition(&mut self, mode: ModeKind, on: bool) {
        self.active.set(mode, on);
        debug!(?mode, active = on, "autopilot mode transition");
        if let Some(obs) = &mut self.observer {
            obs.mode_changed(mode, on);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn rotational_modes_are_exclusive() {
        let mut m = ModeManager::new();
        m.enable(ModeKind::CancelRotation, true);
        m.enable(ModeKind::PointToPosition, true);
        assert!(!m.active().cancel_rotation);
        assert!(m.active().point_to_position);
        assert_eq!(m.active().active_rotational(), Some(ModeKind::PointToPosition));
    }

    #[test]
    fn groups_do_not_interfere() {
        let mut m = ModeManager::new();
        m.enable(ModeKind::OrientationMatch, true);
        m.enable(ModeKind::GoToPosition, true);
        assert!(m.active().orientation_match);
        assert!(m.active().go_to_position);
    }

    #[test]
    fn disable_is_a_plain_clear() {
        let mut m = ModeManager::new();
        m.enable(ModeKind::GoToPosition, true);
        m.enable(ModeKind::GoToPosition, false);
        assert_eq!(m.active(), ModeSet::default());
    }

    struct Recorder(Rc<RefCell<Vec<(ModeKind, bool)>>>);

    impl ModeObserver for Recorder {
        fn mode_changed(&mut self, mode: ModeKind, active: bool) {
            self.0.borrow_mut().push((mode, active));
        }
    }

    #[test]
    fn observer_sees_every_transition() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut m = ModeManager::new();
        m.set_observer(Some(Box::new(Recorder(log.clone()))));
        m.enable(ModeKind::CancelRotation, true);
        m.enable(ModeKind::OrientationMatch, true);
        let events = log.borrow().clone();
        assert_eq!(
            events,
            vec![
                (ModeKind::CancelRotation, true),
                (ModeKind::CancelRotation, false),
                (ModeKind::OrientationMatch, true),
            ]
        );
    }

    #[test]
    fn redundant_enable_emits_nothing() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut m = ModeManager::new();
        m.enable(ModeKind::GoToPosition, true);
        m.set_observer(Some(Box::new(Recorder(log.clone()))));
        m.enable(ModeKind::GoToPosition, true);
        assert!(log.borrow().is_empty());
    }
}
