//! Host multiplayer slots shared between world and overlay passes

use glam::Vec3;

/// Host interface to its multiplayer aircraft slots.
///
/// Slot 0 belongs to the user's own aircraft.
pub trait SlotChannel {
    /// Physical slot count, the user's slot included
    fn capacity(&self) -> usize;
    /// Number of slots, the user's included, the host treats as active
    fn set_active_count(&mut self, count: usize);
    /// Position of remote slot `index` (1-based)
    fn set_position(&mut self, index: usize, position: Vec3);
}

/// Entry offered to [`SharedSlotAllocator::assign`]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SlotCandidate {
    pub position: Vec3,
    pub distance: f32,
    pub slot_eligible: bool,
}

/// Hands the closest eligible aircraft to host slots.
///
/// During the world pass only the user's slot is active so the host does
/// not draw its own copies; during overlays the remote slots are switched
/// back on for TCAS-style consumers.
#[derive(Clone, Copy, Debug, Default)]
pub struct SharedSlotAllocator {
    used_last_frame: usize,
}

impl SharedSlotAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remote slots filled by the last [`assign`](Self::assign)
    pub fn used(&self) -> usize {
        self.used_last_frame
    }

    pub fn before_world_draw(&self, channel: &mut dyn SlotChannel) {
        channel.set_active_count(1.min(channel.capacity()));
    }

    pub fn before_overlay_draw(&self, channel: &mut dyn SlotChannel) {
        let count = (self.used_last_frame + 1).min(channel.capacity());
        channel.set_active_count(count);
    }

    /// Fill remote slots closest-first. Returns the number used.
    pub fn assign(&mut self, channel: &mut dyn SlotChannel, candidates: &[SlotCandidate]) -> usize {
        let available = channel.capacity().saturating_sub(1);
        let mut eligible: Vec<&SlotCandidate> =
            candidates.iter().filter(|c| c.slot_eligible).collect();
        eligible.sort_by(|a, b| a.distance.total_cmp(&b.distance));

        let used = eligible.len().min(available);
        for (i, candidate) in eligible.iter().take(used).enumerate() {
            channel.set_position(i + 1, candidate.position);
        }
        self.used_last_frame = used;
        used
    }
}
