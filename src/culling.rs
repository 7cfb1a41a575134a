//! GPU occlusion-query visibility culling.
//!
//! Each object owns one persistent occlusion query. Per frame the object
//! draws its bounding box as a cheap proxy (depth test only, no colour or
//! depth writes) and asks the GPU how many samples passed. The answer arrives
//! on the GPU's own timeline, so the state machine polls without blocking and
//! keeps using the last completed result until a newer one lands
//! (stale-but-safe). The full mesh is only drawn while that result says the
//! box would be visible.
//!
//! The state machine itself is GPU-free and driven through the [`QueryProbe`]
//! trait; [`QuerySlot`] plus [`GpuProbe`] supply the wgpu backing (a
//! depth-only render pass with an attached query set, resolved into a
//! mappable buffer whose map completion is polled through a channel).

use std::iter;

use crate::{context::Context, error::SceneError};

/// Backend seam for the culling state machine.
///
/// `issue` submits the proxy draw for a new query; `poll` checks the
/// outstanding query without blocking, returning the passed-sample count once
/// it is available.
pub trait QueryProbe {
    fn issue(&mut self);
    fn poll(&mut self) -> Option<u64>;
}

/// Phase of the per-object query cycle.
///
/// `Visible` and `Hidden` are "idle with a decision": any phase other than
/// `Waiting` permits issuing a new query.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QueryPhase {
    Idle,
    Waiting,
    Visible,
    Hidden,
}

/// Per-object occlusion-culling state machine.
#[derive(Debug)]
pub struct OcclusionState {
    phase: QueryPhase,
    visible: bool,
    last_sample_count: u64,
    use_queries: bool,
}

impl OcclusionState {
    /// Before any query completes the object counts as visible, so nothing
    /// pops in late on the first frames.
    pub fn new(use_queries: bool) -> Self {
        Self {
            phase: QueryPhase::Idle,
            visible: true,
            last_sample_count: 0,
            use_queries,
        }
    }

    pub fn phase(&self) -> QueryPhase {
        self.phase
    }

    /// Sample count of the last completed query.
    pub fn last_sample_count(&self) -> u64 {
        self.last_sample_count
    }

    /// The visibility decision from the last completed query. May be a frame
    /// or more old; that latency is the accepted price of never stalling on
    /// GPU readback.
    pub fn visible(&self) -> bool {
        self.visible
    }

    /// Whether the machine is active. False when the backend rejected query
    /// construction; the object then renders unconditionally.
    pub fn use_queries(&self) -> bool {
        self.use_queries
    }

    /// Whether the full mesh should be drawn this frame.
    pub fn should_render(&self) -> bool {
        !self.use_queries || self.visible
    }

    /// Advance the state machine by one frame.
    ///
    /// Issues a new query unless one is still outstanding (at most one in
    /// flight per object), then polls. A not-yet-available result leaves the
    /// previous decision standing.
    pub fn update_visibility(&mut self, probe: &mut dyn QueryProbe) {
        if !self.use_queries {
            return;
        }

        if self.phase != QueryPhase::Waiting {
            probe.issue();
            self.phase = QueryPhase::Waiting;
        }

        if let Some(samples) = probe.poll() {
            self.last_sample_count = samples;
            if samples > 0 {
                self.visible = true;
                self.phase = QueryPhase::Visible;
            } else {
                self.visible = false;
                self.phase = QueryPhase::Hidden;
            }
        }
    }
}

/// One persistent GPU occlusion query with its readback plumbing.
///
/// Owned exclusively by a single object. `pending` holds the channel for an
/// in-flight buffer map; the state machine guarantees it is never replaced
/// while set. Dropping the slot releases the query set and buffers without
/// waiting for an outstanding query.
#[derive(Debug)]
pub struct QuerySlot {
    query_set: wgpu::QuerySet,
    resolve_buffer: wgpu::Buffer,
    readback_buffer: wgpu::Buffer,
    pending: Option<crossbeam_channel::Receiver<Result<(), wgpu::BufferAsyncError>>>,
}

impl QuerySlot {
    /// Create the query set and readback buffers.
    ///
    /// Failures are caught with error scopes: an allocation failure maps to
    /// [`SceneError::ResourceExhaustion`], a validation rejection to
    /// [`SceneError::UnsupportedFeature`] so callers can fall back to
    /// always-visible rendering.
    pub async fn new(device: &wgpu::Device, label: &str) -> Result<Self, SceneError> {
        device.push_error_scope(wgpu::ErrorFilter::Validation);
        device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);

        let query_set = device.create_query_set(&wgpu::QuerySetDescriptor {
            label: Some(label),
            ty: wgpu::QueryType::Occlusion,
            count: 1,
        });
        let resolve_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Occlusion Resolve Buffer"),
            size: wgpu::QUERY_SIZE as wgpu::BufferAddress,
            usage: wgpu::BufferUsages::QUERY_RESOLVE | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });
        let readback_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Occlusion Readback Buffer"),
            size: wgpu::QUERY_SIZE as wgpu::BufferAddress,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        if let Some(error) = device.pop_error_scope().await {
            return Err(SceneError::ResourceExhaustion(error.to_string()));
        }
        if let Some(error) = device.pop_error_scope().await {
            return Err(SceneError::UnsupportedFeature(error.to_string()));
        }

        Ok(Self {
            query_set,
            resolve_buffer,
            readback_buffer,
            pending: None,
        })
    }
}

/// wgpu-backed [`QueryProbe`] borrowing an object's proxy buffer and slot for
/// one `update_visibility` call.
pub(crate) struct GpuProbe<'a> {
    pub ctx: &'a Context,
    pub slot: &'a mut QuerySlot,
    pub proxy_buffer: &'a wgpu::Buffer,
    pub proxy_vertex_count: u32,
    pub model_bind_group: &'a wgpu::BindGroup,
}

impl QueryProbe for GpuProbe<'_> {
    fn issue(&mut self) {
        let mut encoder =
            self.ctx
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("Occlusion Query Encoder"),
                });
        {
            // Depth-only pass: no colour attachment, depth loaded from the
            // previous frame's draw pass and never written. The proxy cannot
            // pollute either buffer.
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Occlusion Proxy Pass"),
                color_attachments: &[],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.ctx.depth_texture.view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                occlusion_query_set: Some(&self.slot.query_set),
                timestamp_writes: None,
            });

            pass.set_pipeline(&self.ctx.pipelines.proxy);
            pass.set_bind_group(0, &self.ctx.camera.bind_group, &[]);
            pass.set_bind_group(1, self.model_bind_group, &[]);
            pass.set_vertex_buffer(0, self.proxy_buffer.slice(..));
            pass.begin_occlusion_query(0);
            pass.draw(0..self.proxy_vertex_count, 0..1);
            pass.end_occlusion_query();
        }
        encoder.resolve_query_set(&self.slot.query_set, 0..1, &self.slot.resolve_buffer, 0);
        encoder.copy_buffer_to_buffer(
            &self.slot.resolve_buffer,
            0,
            &self.slot.readback_buffer,
            0,
            wgpu::QUERY_SIZE as wgpu::BufferAddress,
        );
        self.ctx.queue.submit(iter::once(encoder.finish()));

        let (tx, rx) = crossbeam_channel::bounded(1);
        self.slot
            .readback_buffer
            .slice(..)
            .map_async(wgpu::MapMode::Read, move |result| {
                let _ = tx.send(result);
            });
        self.slot.pending = Some(rx);
    }

    fn poll(&mut self) -> Option<u64> {
        let pending = self.slot.pending.as_ref()?;
        if let Err(e) = self.ctx.device.poll(wgpu::PollType::Poll) {
            log::warn!("device poll failed: {e}");
            return None;
        }
        match pending.try_recv() {
            Ok(Ok(())) => {
                self.slot.pending = None;
                let samples = {
                    let view = self.slot.readback_buffer.slice(..).get_mapped_range();
                    u64::from_le_bytes(view[..8].try_into().expect("query result is 8 bytes"))
                };
                self.slot.readback_buffer.unmap();
                Some(samples)
            }
            Err(crossbeam_channel::TryRecvError::Empty) => None,
            Ok(Err(e)) => {
                // Worst case wins on a broken readback so the object is never
                // culled away permanently.
                log::warn!("occlusion query readback failed: {e}; assuming visible");
                self.slot.pending = None;
                Some(1)
            }
            Err(crossbeam_channel::TryRecvError::Disconnected) => {
                log::warn!("occlusion query readback channel dropped; assuming visible");
                self.slot.pending = None;
                Some(1)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use super::*;

    /// Scripted backend: each `poll` consumes one pre-programmed response.
    struct ScriptProbe {
        responses: VecDeque<Option<u64>>,
        issued: u32,
        completed: u32,
    }

    impl ScriptProbe {
        fn new(responses: impl IntoIterator<Item = Option<u64>>) -> Self {
            Self {
                responses: responses.into_iter().collect(),
                issued: 0,
                completed: 0,
            }
        }
    }

    impl QueryProbe for ScriptProbe {
        fn issue(&mut self) {
            self.issued += 1;
        }

        fn poll(&mut self) -> Option<u64> {
            let response = self.responses.pop_front().unwrap_or(None);
            if response.is_some() {
                self.completed += 1;
            }
            response
        }
    }

    #[test]
    fn pending_query_keeps_previous_decision() {
        let mut state = OcclusionState::new(true);
        let mut probe = ScriptProbe::new([None]);

        state.update_visibility(&mut probe);

        assert_eq!(state.phase(), QueryPhase::Waiting);
        assert!(state.visible(), "default decision must stand");
        assert_eq!(probe.issued, 1);
    }

    #[test]
    fn zero_samples_hides_and_rearms() {
        let mut state = OcclusionState::new(true);
        let mut probe = ScriptProbe::new([Some(0), None]);

        state.update_visibility(&mut probe);
        assert_eq!(state.phase(), QueryPhase::Hidden);
        assert!(!state.visible());
        assert!(!state.should_render());
        assert_eq!(state.last_sample_count(), 0);

        // Hidden is not Waiting, so the next call issues again.
        state.update_visibility(&mut probe);
        assert_eq!(probe.issued, 2);
        assert_eq!(state.phase(), QueryPhase::Waiting);
    }

    #[test]
    fn positive_samples_show_and_rearm() {
        let mut state = OcclusionState::new(true);
        let mut probe = ScriptProbe::new([Some(17), None]);

        state.update_visibility(&mut probe);
        assert_eq!(state.phase(), QueryPhase::Visible);
        assert!(state.visible());
        assert_eq!(state.last_sample_count(), 17);

        state.update_visibility(&mut probe);
        assert_eq!(probe.issued, 2);
    }

    #[test]
    fn stale_result_survives_long_latency() {
        let mut state = OcclusionState::new(true);
        let mut probe = ScriptProbe::new([Some(0), None, None, None, Some(4)]);

        state.update_visibility(&mut probe);
        assert!(!state.visible());

        // Result of the re-issued query takes three frames to arrive; the
        // hidden decision stays in force the whole time.
        for _ in 0..3 {
            state.update_visibility(&mut probe);
            assert!(!state.visible());
            assert_eq!(state.phase(), QueryPhase::Waiting);
        }

        state.update_visibility(&mut probe);
        assert!(state.visible());
    }

    #[test]
    fn at_most_one_query_outstanding() {
        let mut state = OcclusionState::new(true);
        let script = [None, Some(3), None, None, Some(0), None, Some(5)];
        let mut probe = ScriptProbe::new(script);

        for _ in 0..script.len() {
            state.update_visibility(&mut probe);
            let in_flight = if state.phase() == QueryPhase::Waiting { 1 } else { 0 };
            assert_eq!(probe.issued, probe.completed + in_flight);
        }
        assert_eq!(probe.completed, 3);
    }

    #[test]
    fn disabled_machine_never_issues_and_always_renders() {
        let mut state = OcclusionState::new(false);
        let mut probe = ScriptProbe::new([Some(0), Some(0), Some(0)]);

        for _ in 0..3 {
            state.update_visibility(&mut probe);
            assert!(state.should_render());
        }
        assert_eq!(probe.issued, 0);
        assert_eq!(state.phase(), QueryPhase::Idle);
    }
}
