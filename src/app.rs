//! Application event loop and per-frame driving code.
//!
//! The loop owns the [`Context`], the [`Scene`] and the selected
//! [`ViewProvider`], and runs the fixed two-pass frame: occlusion query pass
//! first (against the previous frame's depth), then the draw pass. Input is
//! routed to the camera controller; `R` resets the camera, `L` logs culling
//! statistics.

use std::{iter, sync::Arc};

use cgmath::Matrix4;
use instant::Instant;
use winit::{
    application::ApplicationHandler,
    event::{DeviceEvent, DeviceId, ElementState, KeyEvent, MouseButton, WindowEvent},
    event_loop::{ActiveEventLoop, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::Window,
};

use crate::{
    context::Context,
    data_structures::{object::RenderableObject, texture::Texture},
    resources,
    scene::{ObjectDesc, Scene, ViewProvider},
};

async fn load_scene(ctx: &Context, descs: &[ObjectDesc]) -> anyhow::Result<Scene> {
    let loads = descs.iter().map(|desc| async {
        let data = resources::load_mesh_obj(&desc.mesh).await?;
        let texture =
            resources::texture::load_texture(&desc.texture, &ctx.device, &ctx.queue).await?;
        anyhow::Ok((data, texture))
    });
    let loaded = futures::future::join_all(loads).await;

    let mut objects = Vec::with_capacity(descs.len());
    for (result, desc) in loaded.into_iter().zip(descs) {
        let (data, texture) = result?;
        let mut object = RenderableObject::new(ctx, &data, texture, desc.scale).await?;
        object.set_transform(
            &ctx.queue,
            Matrix4::from_translation(desc.translation.into()),
        );
        objects.push(object);
    }
    Ok(Scene::new(objects))
}

/// GPU context, scene and view provider bundled with surface status.
struct AppState {
    ctx: Context,
    scene: Scene,
    view: Box<dyn ViewProvider>,
    is_surface_configured: bool,
    mouse_pressed: bool,
}

impl AppState {
    fn resize(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.ctx.config.width = width;
            self.ctx.config.height = height;
            self.is_surface_configured = true;
            self.ctx.projection.resize(width, height);
            self.ctx
                .surface
                .configure(&self.ctx.device, &self.ctx.config);
            self.ctx.depth_texture = Texture::create_depth_texture(
                &self.ctx.device,
                [self.ctx.config.width, self.ctx.config.height],
                "depth_texture",
            );
        }
    }

    fn reset_camera(&mut self) {
        let camera = &mut self.ctx.camera.camera;
        camera.position = (0.0, 0.0, 20.0).into();
        camera.yaw = cgmath::Deg(-90.0).into();
        camera.pitch = cgmath::Deg(0.0).into();
    }

    fn render(&mut self) -> Result<(), wgpu::SurfaceError> {
        self.ctx.window.request_redraw();

        // Rendering requires the surface to be configured
        if !self.is_surface_configured {
            return Ok(());
        }

        let output = self.ctx.surface.get_current_texture()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        // Query pass before the draw pass clears depth: every bounding box is
        // tested against the scene depth the previous frame left behind.
        // Stereo providers skip culling, there is no per-eye depth history.
        if self.view.eye_count() == 1 {
            self.scene.query_pass(&self.ctx);
        }

        for eye in 0..self.view.eye_count() {
            let view_proj =
                self.view
                    .view_proj(&self.ctx.camera.camera, &self.ctx.projection, eye);
            self.ctx
                .camera
                .uniform
                .set_view_proj(&self.ctx.camera.camera, view_proj);
            self.ctx.queue.write_buffer(
                &self.ctx.camera.buffer,
                0,
                bytemuck::cast_slice(&[self.ctx.camera.uniform]),
            );

            let mut encoder =
                self.ctx
                    .device
                    .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                        label: Some("Render Encoder"),
                    });
            {
                let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                    label: Some("Draw Pass"),
                    color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                        view: &view,
                        resolve_target: None,
                        ops: wgpu::Operations {
                            load: wgpu::LoadOp::Clear(self.ctx.clear_colour),
                            store: wgpu::StoreOp::Store,
                        },
                        depth_slice: None,
                    })],
                    depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                        view: &self.ctx.depth_texture.view,
                        depth_ops: Some(wgpu::Operations {
                            load: wgpu::LoadOp::Clear(1.0),
                            store: wgpu::StoreOp::Store,
                        }),
                        stencil_ops: None,
                    }),
                    occlusion_query_set: None,
                    timestamp_writes: None,
                });

                self.scene.draw_pass(&self.ctx, &mut pass);
            }
            self.ctx.queue.submit(iter::once(encoder.finish()));
        }

        output.present();
        Ok(())
    }
}

pub struct App {
    async_runtime: tokio::runtime::Runtime,
    descs: Option<Vec<ObjectDesc>>,
    view: Option<Box<dyn ViewProvider>>,
    state: Option<AppState>,
    last_time: Instant,
}

impl App {
    fn new(descs: Vec<ObjectDesc>, view: Box<dyn ViewProvider>) -> Self {
        let async_runtime = tokio::runtime::Runtime::new().expect("Failed to create tokio runtime");
        Self {
            async_runtime,
            descs: Some(descs),
            view: Some(view),
            state: None,
            last_time: Instant::now(),
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        let window_attributes = Window::default_attributes().with_title("flyby-cull");
        let window = Arc::new(
            event_loop
                .create_window(window_attributes)
                .expect("Failed to create the main window"),
        );

        let descs = self.descs.take().unwrap_or_default();
        let view = self.view.take().expect("resumed twice without suspension");

        let state = self.async_runtime.block_on(async {
            let ctx = Context::new(window).await?;
            let scene = load_scene(&ctx, &descs).await?;
            anyhow::Ok(AppState {
                ctx,
                scene,
                view,
                is_surface_configured: false,
                mouse_pressed: false,
            })
        });
        match state {
            Ok(state) => self.state = Some(state),
            Err(e) => panic!("App initialization failed: {}", e),
        }
    }

    fn device_event(
        &mut self,
        _event_loop: &ActiveEventLoop,
        _device_id: DeviceId,
        event: DeviceEvent,
    ) {
        let state = match &mut self.state {
            Some(state) => state,
            None => return,
        };
        if let DeviceEvent::MouseMotion { delta: (dx, dy) } = event {
            if state.mouse_pressed {
                state.ctx.camera.controller.handle_mouse(dx, dy);
            }
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: winit::window::WindowId,
        event: WindowEvent,
    ) {
        let state = match &mut self.state {
            Some(state) => state,
            None => return,
        };

        state.ctx.camera.controller.handle_window_events(&event);

        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::Resized(size) => state.resize(size.width, size.height),
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(code),
                        state: ElementState::Pressed,
                        ..
                    },
                ..
            } => match code {
                KeyCode::KeyR => state.reset_camera(),
                KeyCode::KeyL => state.scene.log_stats(),
                KeyCode::Escape => event_loop.exit(),
                _ => {}
            },
            WindowEvent::MouseInput {
                state: button_state,
                button: MouseButton::Right,
                ..
            } => {
                state.mouse_pressed = button_state.is_pressed();
            }
            WindowEvent::RedrawRequested => {
                let dt = self.last_time.elapsed();
                self.last_time = Instant::now();

                state
                    .ctx
                    .camera
                    .controller
                    .update(&mut state.ctx.camera.camera, dt);

                match state.render() {
                    Ok(_) => {}
                    // Reconfigure the surface if it's lost or outdated
                    Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                        let size = state.ctx.window.inner_size();
                        state.resize(size.width, size.height);
                    }
                    Err(e) => {
                        log::error!("Unable to render {}", e);
                    }
                }
            }
            _ => {}
        }
    }
}

/// Run the demo with the given scene description and view provider.
pub fn run(descs: Vec<ObjectDesc>, view: Box<dyn ViewProvider>) -> anyhow::Result<()> {
    if let Err(e) = env_logger::try_init() {
        println!("Warning: Could not initialize logger: {}", e);
    }

    let event_loop = EventLoop::new()?;
    let mut app = App::new(descs, view);
    event_loop.run_app(&mut app)?;

    Ok(())
}
