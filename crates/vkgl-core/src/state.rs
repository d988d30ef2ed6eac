//! Lifecycle of one shared-image chain.

use crate::error::{Error, Result};

/// Stage reached by a Vulkan-image-to-GL-texture chain.
///
/// Stages advance strictly in declaration order. `Displayed` may repeat once
/// per frame, and `Destroyed` is reachable from every stage and is terminal.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ResourceState {
    #[default]
    Uninitialized,
    ImageCreated,
    MemoryAllocated,
    Bound,
    Exported,
    Imported,
    Displayed,
    Destroyed,
}

impl ResourceState {
    /// The single stage that follows this one in the forward direction.
    pub const fn next(self) -> Option<Self> {
        match self {
            Self::Uninitialized => Some(Self::ImageCreated),
            Self::ImageCreated => Some(Self::MemoryAllocated),
            Self::MemoryAllocated => Some(Self::Bound),
            Self::Bound => Some(Self::Exported),
            Self::Exported => Some(Self::Imported),
            Self::Imported | Self::Displayed => Some(Self::Displayed),
            Self::Destroyed => None,
        }
    }

    /// Returns true if moving from `self` to `to` is allowed.
    pub fn can_transition(self, to: Self) -> bool {
        if self == Self::Destroyed {
            return false;
        }
        to == Self::Destroyed || self.next() == Some(to)
    }

    /// Move to `to`, or fail with [`Error::InvalidTransition`].
    pub fn advance(&mut self, to: Self) -> Result<()> {
        if !self.can_transition(to) {
            return Err(Error::InvalidTransition { from: *self, to });
        }
        *self = to;
        Ok(())
    }

    /// Returns true once the image has memory bound and can be written.
    pub fn is_writable(self) -> bool {
        matches!(
            self,
            Self::Bound | Self::Exported | Self::Imported | Self::Displayed
        )
    }

    /// Returns true once a GL texture backed by the shared memory exists.
    pub fn is_displayable(self) -> bool {
        matches!(self, Self::Imported | Self::Displayed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FORWARD: [ResourceState; 7] = [
        ResourceState::Uninitialized,
        ResourceState::ImageCreated,
        ResourceState::MemoryAllocated,
        ResourceState::Bound,
        ResourceState::Exported,
        ResourceState::Imported,
        ResourceState::Displayed,
    ];

    #[test]
    fn forward_sequence_is_accepted() {
        let mut state = ResourceState::default();
        for stage in &FORWARD[1..] {
            state.advance(*stage).unwrap();
        }
        state.advance(ResourceState::Displayed).unwrap();
        assert_eq!(state, ResourceState::Displayed);
    }

    #[test]
    fn skipping_a_stage_is_rejected() {
        let mut state = ResourceState::ImageCreated;
        assert!(state.advance(ResourceState::Bound).is_err());
        assert_eq!(state, ResourceState::ImageCreated);
    }

    #[test]
    fn no_re_export_after_import() {
        let mut state = ResourceState::Imported;
        assert!(state.advance(ResourceState::Exported).is_err());
        assert!(state.advance(ResourceState::ImageCreated).is_err());
    }

    #[test]
    fn destroyed_is_reachable_from_everywhere_and_terminal() {
        for stage in FORWARD {
            let mut state = stage;
            state.advance(ResourceState::Destroyed).unwrap();
            for other in FORWARD {
                assert!(!state.can_transition(other));
            }
            assert!(!state.can_transition(ResourceState::Destroyed));
        }
    }
}
