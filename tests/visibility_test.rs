//! Visibility gating across several simulated frames, driven through the
//! public culling API with scripted probes instead of a GPU.

use std::collections::VecDeque;

use flyby_cull::{OcclusionState, QueryPhase, QueryProbe};

/// Probe whose result is always available one `poll` after `issue`.
struct ImmediateProbe {
    samples: VecDeque<u64>,
}

impl ImmediateProbe {
    fn new(samples: impl IntoIterator<Item = u64>) -> Self {
        Self {
            samples: samples.into_iter().collect(),
        }
    }
}

impl QueryProbe for ImmediateProbe {
    fn issue(&mut self) {}

    fn poll(&mut self) -> Option<u64> {
        self.samples.pop_front()
    }
}

#[test]
fn fully_occluded_scene_culls_every_object() {
    let mut states = [OcclusionState::new(true), OcclusionState::new(true)];
    let mut probes = [
        ImmediateProbe::new([0, 0, 0]),
        ImmediateProbe::new([0, 0, 0]),
    ];

    // Frame 0: nothing has completed yet at the gate, both still render.
    assert!(states.iter().all(|s| s.should_render()));

    for frame in 0..3 {
        let mut rendered = 0;
        for (state, probe) in states.iter_mut().zip(probes.iter_mut()) {
            state.update_visibility(probe);
            if state.should_render() {
                rendered += 1;
            }
        }
        assert_eq!(rendered, 0, "frame {frame} should draw nothing");
    }

    assert!(states.iter().all(|s| s.phase() == QueryPhase::Hidden));
}

#[test]
fn object_reappears_when_samples_return() {
    let mut state = OcclusionState::new(true);
    let mut probe = ImmediateProbe::new([0, 0, 5]);

    state.update_visibility(&mut probe);
    assert!(!state.should_render());

    state.update_visibility(&mut probe);
    assert!(!state.should_render());

    state.update_visibility(&mut probe);
    assert!(state.should_render());
    assert_eq!(state.last_sample_count(), 5);
    assert_eq!(state.phase(), QueryPhase::Visible);
}

#[test]
fn unsupported_queries_render_every_frame() {
    let mut state = OcclusionState::new(false);
    let mut probe = ImmediateProbe::new([0; 10]);

    for _ in 0..10 {
        state.update_visibility(&mut probe);
        assert!(state.should_render());
    }
    // The probe was never consulted.
    assert_eq!(probe.samples.len(), 10);
}

#[test]
fn mixed_scene_gates_objects_independently() {
    let mut visible = OcclusionState::new(true);
    let mut hidden = OcclusionState::new(true);
    let mut plain = OcclusionState::new(false);

    let mut visible_probe = ImmediateProbe::new([9, 9]);
    let mut hidden_probe = ImmediateProbe::new([0, 0]);
    let mut plain_probe = ImmediateProbe::new([]);

    for _ in 0..2 {
        visible.update_visibility(&mut visible_probe);
        hidden.update_visibility(&mut hidden_probe);
        plain.update_visibility(&mut plain_probe);

        let rendered = [&visible, &hidden, &plain]
            .iter()
            .filter(|s| s.should_render())
            .count();
        assert_eq!(rendered, 2);
    }
}
