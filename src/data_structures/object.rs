//! Renderable scene objects.
//!
//! A [`RenderableObject`] couples a mesh, a diffuse texture, a model
//! transform and the occlusion-culling state. It owns the GPU buffers for the
//! full mesh, the bounding-box proxy buffer used for queries, and one
//! exclusive query slot. All GPU resources (the query included) are released
//! on drop, whether or not a query is still outstanding.

use cgmath::{Matrix4, SquareMatrix};
use wgpu::util::DeviceExt;

use crate::{
    context::Context,
    culling::{GpuProbe, OcclusionState, QuerySlot},
    data_structures::{
        bounds::{Aabb, PROXY_VERTEX_COUNT},
        mesh::{MeshData, MeshVertex},
        texture::Texture,
    },
    error::SceneError,
};

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct ModelUniform {
    model: [[f32; 4]; 4],
}

/// A textured mesh with its own model transform and occlusion query.
#[derive(Debug)]
pub struct RenderableObject {
    pub name: String,
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    num_indices: u32,
    proxy_buffer: wgpu::Buffer,
    texture_bind_group: wgpu::BindGroup,
    model_buffer: wgpu::Buffer,
    model_bind_group: wgpu::BindGroup,
    aabb: Aabb,
    occlusion: OcclusionState,
    query_slot: Option<QuerySlot>,
    transform: Matrix4<f32>,
}

impl RenderableObject {
    /// Build the GPU resources for a loaded mesh and texture.
    ///
    /// `scale` is baked into the vertex buffer and the bounding box once; the
    /// box is not recomputed on later transform changes. An empty mesh fails
    /// with [`SceneError::InvalidMesh`], an allocation failure with
    /// [`SceneError::ResourceExhaustion`]. If the backend rejects the
    /// occlusion query, the object is still constructed and will render
    /// unconditionally every frame.
    pub async fn new(
        ctx: &Context,
        data: &MeshData,
        texture: Texture,
        scale: f32,
    ) -> Result<Self, SceneError> {
        let aabb = Aabb::from_vertices(&data.name, &data.vertices, scale)?;
        let vertices: Vec<MeshVertex> = data.vertices.iter().map(|v| v.scaled(scale)).collect();

        let device = &ctx.device;
        device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);

        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{:?} Vertex Buffer", data.name)),
            contents: bytemuck::cast_slice(&vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{:?} Index Buffer", data.name)),
            contents: bytemuck::cast_slice(&data.indices),
            usage: wgpu::BufferUsages::INDEX,
        });
        let proxy_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{:?} Bounding Box Buffer", data.name)),
            contents: bytemuck::cast_slice(&aabb.proxy_vertices()),
            usage: wgpu::BufferUsages::VERTEX,
        });

        let transform = Matrix4::identity();
        let model_uniform = ModelUniform {
            model: transform.into(),
        };
        let model_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{:?} Model Buffer", data.name)),
            contents: bytemuck::cast_slice(&[model_uniform]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        if let Some(error) = device.pop_error_scope().await {
            return Err(SceneError::ResourceExhaustion(error.to_string()));
        }

        let model_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &ctx.layouts.model,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: model_buffer.as_entire_binding(),
            }],
            label: Some(&format!("{:?} model_bind_group", data.name)),
        });
        let sampler = texture
            .sampler
            .clone()
            .unwrap_or_else(|| crate::data_structures::texture::create_default_sampler(device));
        let texture_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &ctx.layouts.texture,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&texture.view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&sampler),
                },
            ],
            label: Some(&format!("{:?} texture_bind_group", data.name)),
        });

        let (query_slot, use_queries) =
            match QuerySlot::new(device, &format!("{:?} Occlusion Query", data.name)).await {
                Ok(slot) => (Some(slot), true),
                Err(SceneError::UnsupportedFeature(reason)) => {
                    log::warn!(
                        "occlusion queries unavailable for {:?}: {}; rendering unconditionally",
                        data.name,
                        reason
                    );
                    (None, false)
                }
                Err(other) => return Err(other),
            };

        Ok(Self {
            name: data.name.clone(),
            vertex_buffer,
            index_buffer,
            num_indices: data.indices.len() as u32,
            proxy_buffer,
            texture_bind_group,
            model_buffer,
            model_bind_group,
            aabb,
            occlusion: OcclusionState::new(use_queries),
            query_slot,
            transform,
        })
    }

    /// Replace the model transform and push it to the GPU.
    pub fn set_transform(&mut self, queue: &wgpu::Queue, transform: Matrix4<f32>) {
        self.transform = transform;
        let uniform = ModelUniform {
            model: transform.into(),
        };
        queue.write_buffer(&self.model_buffer, 0, bytemuck::cast_slice(&[uniform]));
    }

    pub fn transform(&self) -> Matrix4<f32> {
        self.transform
    }

    pub fn aabb(&self) -> Aabb {
        self.aabb
    }

    /// Whether this object participates in occlusion culling.
    pub fn uses_queries(&self) -> bool {
        self.occlusion.use_queries()
    }

    /// Last completed visibility decision (possibly a frame or more old).
    pub fn visible(&self) -> bool {
        self.occlusion.visible()
    }

    pub fn last_sample_count(&self) -> u64 {
        self.occlusion.last_sample_count()
    }

    /// Whether the full mesh should be drawn this frame.
    pub fn should_render(&self) -> bool {
        self.occlusion.should_render()
    }

    /// Drive the occlusion query state machine for this frame.
    ///
    /// Issues a bounding-box proxy query unless one is already in flight,
    /// then polls for a result. No-op when queries are disabled for this
    /// object.
    pub fn render_occlusion_query(&mut self, ctx: &Context) {
        let Some(slot) = self.query_slot.as_mut() else {
            return;
        };
        let mut probe = GpuProbe {
            ctx,
            slot,
            proxy_buffer: &self.proxy_buffer,
            proxy_vertex_count: PROXY_VERTEX_COUNT,
            model_bind_group: &self.model_bind_group,
        };
        self.occlusion.update_visibility(&mut probe);
    }

    /// Record the full-mesh draw into an open render pass.
    ///
    /// Rebinds texture, model, vertex and index buffers; callers must not
    /// assume bindings persist across objects.
    pub fn render(&self, pass: &mut wgpu::RenderPass<'_>) {
        pass.set_bind_group(0, &self.texture_bind_group, &[]);
        pass.set_bind_group(2, &self.model_bind_group, &[]);
        pass.set_vertex_buffer(0, self.vertex_buffer.slice(..));
        pass.set_index_buffer(self.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
        pass.draw_indexed(0..self.num_indices, 0, 0..1);
    }
}
