//! Scene driver: the two-pass frame over all renderable objects.
//!
//! Each frame runs a query pass followed by a draw pass. The query pass
//! tests every object's bounding box against the depth buffer as the
//! previous frame's draw pass left it (the depth attachment is loaded, not
//! cleared, and the proxy never writes). This means a culling decision can
//! lag camera motion by a frame, which is the accepted price of keeping the
//! CPU from ever waiting on the GPU.

use cgmath::Matrix4;

use crate::{
    camera::{Camera, Projection},
    context::Context,
    data_structures::object::RenderableObject,
};

/// Produces the view-projection matrix per eye.
///
/// Selected at startup; the render path is identical for mono and stereo
/// providers. Occlusion culling only runs for single-eye providers: a stereo
/// query pass would need per-eye depth history, which this demo does not keep.
pub trait ViewProvider {
    fn eye_count(&self) -> usize {
        1
    }

    fn view_proj(&self, camera: &Camera, projection: &Projection, eye: usize) -> Matrix4<f32>;
}

/// Plain single-eye view straight from the fly camera.
#[derive(Debug, Default)]
pub struct MonoView;

impl ViewProvider for MonoView {
    fn view_proj(&self, camera: &Camera, projection: &Projection, _eye: usize) -> Matrix4<f32> {
        projection.calc_matrix() * camera.calc_matrix()
    }
}

/// Ordered collection of renderable objects, iterated by index.
#[derive(Debug)]
pub struct Scene {
    pub objects: Vec<RenderableObject>,
    rendered_last_frame: usize,
}

impl Scene {
    pub fn new(objects: Vec<RenderableObject>) -> Self {
        Self {
            objects,
            rendered_last_frame: 0,
        }
    }

    /// First pass: advance every object's occlusion query state machine.
    ///
    /// Objects whose queries are disabled are skipped entirely; they render
    /// unconditionally in the draw pass.
    pub fn query_pass(&mut self, ctx: &Context) {
        for object in self.objects.iter_mut() {
            if object.uses_queries() {
                object.render_occlusion_query(ctx);
            }
        }
    }

    /// Second pass: draw every object whose last completed query said its
    /// bounding box is visible.
    pub fn draw_pass(&mut self, ctx: &Context, pass: &mut wgpu::RenderPass<'_>) {
        pass.set_pipeline(&ctx.pipelines.scene);
        pass.set_bind_group(1, &ctx.camera.bind_group, &[]);

        let mut rendered = 0;
        for object in self.objects.iter() {
            if object.should_render() {
                object.render(pass);
                rendered += 1;
            }
        }
        self.rendered_last_frame = rendered;
    }

    /// How many objects passed the visibility gate in the last draw pass.
    pub fn rendered_last_frame(&self) -> usize {
        self.rendered_last_frame
    }

    pub fn log_stats(&self) {
        log::info!(
            "rendered {}/{} objects last frame",
            self.rendered_last_frame,
            self.objects.len()
        );
        for object in &self.objects {
            log::info!(
                "  {:?}: visible={} samples={} queries={}",
                object.name,
                object.visible(),
                object.last_sample_count(),
                object.uses_queries()
            );
        }
    }
}

/// Description of one demo object: asset files, bake-in scale and placement.
#[derive(Clone, Debug)]
pub struct ObjectDesc {
    pub mesh: String,
    pub texture: String,
    pub scale: f32,
    pub translation: [f32; 3],
}

impl ObjectDesc {
    pub fn new(mesh: &str, texture: &str, scale: f32, translation: [f32; 3]) -> Self {
        Self {
            mesh: mesh.to_string(),
            texture: texture.to_string(),
            scale,
            translation,
        }
    }
}
