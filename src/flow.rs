//! Application event loop.
//!
//! [`App`] owns a [`Viewer`] and drives it from winit: window input is turned
//! into pointer, touch and orbit calls, every redraw advances the viewer by the
//! frame delta and hands the scene to the [`SceneRenderer`].
//!
//! # Lifecycle
//!
//! 1. `resumed` creates the window and GPU context and starts loading the registry
//! 2. Each part arrives as its own user event once fetched and is attached right away
//! 3. Each `RedrawRequested` advances the viewer, syncs the GPU mirror and presents a frame
//!
//! Natively the async work is resolved on a tokio runtime; on the web it is
//! spawned on the browser's executor and reported back through the event loop proxy.

use std::{iter, sync::Arc};

#[cfg(not(target_arch = "wasm32"))]
use anyhow::Context as _;
use futures::StreamExt;
use instant::Instant;
use winit::{
    application::ApplicationHandler,
    dpi::PhysicalPosition,
    event::{ElementState, MouseButton, MouseScrollDelta, TouchPhase, WindowEvent},
    event_loop::{ActiveEventLoop, EventLoop, EventLoopProxy},
    window::Window,
};

use crate::{
    config::ViewerConfig,
    context::Context,
    registry::{ModelDescriptor, Variant},
    render::SceneRenderer,
    resources::{
        AssetSource,
        loader::{LoadOutcome, ModelLoader},
    },
    viewer::Viewer,
};

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

pub(crate) struct AppState {
    ctx: Context,
    renderer: SceneRenderer,
}

impl AppState {
    async fn new(window: Arc<Window>, config: ViewerConfig) -> anyhow::Result<Self> {
        let ctx = Context::new(window, &config).await?;
        let renderer = SceneRenderer::new(&ctx);
        Ok(Self { ctx, renderer })
    }

    fn resize(&mut self, width: u32, height: u32, viewer: &mut Viewer) {
        if width > 0 && height > 0 {
            self.ctx.resize(width, height);
            viewer.resize(width, height);
        }
    }

    fn render(&mut self, viewer: &Viewer) -> Result<(), wgpu::SurfaceError> {
        self.ctx.update_camera(viewer.camera(), viewer.projection());
        self.renderer.sync(&self.ctx, viewer.scene());

        let output = self.ctx.surface.get_current_texture()?;
        let view = output.texture.create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = self.ctx.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Render Encoder"),
        });
        let clear = viewer.config().clear_color;
        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color {
                            r: clear.r as f64,
                            g: clear.g as f64,
                            b: clear.b as f64,
                            a: 1.0,
                        }),
                        store: wgpu::StoreOp::Store,
                    },
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
            self.renderer.draw(&mut render_pass, &self.ctx, viewer.scene());
        }
        self.ctx.queue.submit(iter::once(encoder.finish()));
        output.present();
        Ok(())
    }
}

pub(crate) enum FlowEvent {
    Initialized(Box<AppState>),
    Loaded(Box<LoadOutcome>),
    Failed(anyhow::Error),
}

impl std::fmt::Debug for FlowEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FlowEvent::Initialized(_) => f.write_str("Initialized"),
            FlowEvent::Loaded(outcome) => f.debug_tuple("Loaded").field(&outcome.descriptor.path).finish(),
            FlowEvent::Failed(err) => f.debug_tuple("Failed").field(err).finish(),
        }
    }
}

pub struct App {
    #[cfg(not(target_arch = "wasm32"))]
    async_runtime: tokio::runtime::Runtime,
    proxy: EventLoopProxy<FlowEvent>,
    state: Option<AppState>,
    viewer: Viewer,
    variant: Variant,
    last_time: Instant,
    cursor: PhysicalPosition<f64>,
    orbiting: bool,
}

impl App {
    fn new(event_loop: &EventLoop<FlowEvent>, variant: Variant, config: ViewerConfig) -> anyhow::Result<Self> {
        let proxy = event_loop.create_proxy();
        #[cfg(not(target_arch = "wasm32"))]
        let async_runtime = tokio::runtime::Runtime::new().context("starting the async runtime")?;
        Ok(Self {
            #[cfg(not(target_arch = "wasm32"))]
            async_runtime,
            proxy,
            state: None,
            viewer: Viewer::new(config, 1, 1),
            variant,
            last_time: Instant::now(),
            cursor: PhysicalPosition::new(0.0, 0.0),
            orbiting: false,
        })
    }

    fn ndc(&self, position: PhysicalPosition<f64>) -> [f32; 2] {
        let Some(state) = &self.state else {
            return [0.0, 0.0];
        };
        let width = state.ctx.config.width.max(1) as f64;
        let height = state.ctx.config.height.max(1) as f64;
        [
            (position.x / width * 2.0 - 1.0) as f32,
            (1.0 - position.y / height * 2.0) as f32,
        ]
    }

    /// Fetches every registry part off the event loop, reporting each one with [`FlowEvent::Loaded`].
    fn start_loading(&self) {
        let loader = self.viewer.loader();
        let descriptors = self.variant.descriptors();
        let proxy = self.proxy.clone();
        log::info!("Loading {} parts of the {} registry", descriptors.len(), self.variant);

        #[cfg(not(target_arch = "wasm32"))]
        {
            let handle = self.async_runtime.handle().clone();
            self.async_runtime.spawn_blocking(move || {
                let source = crate::resources::FileSource::default();
                handle.block_on(report_outcomes(loader, source, descriptors, proxy));
            });
        }

        #[cfg(target_arch = "wasm32")]
        {
            wasm_bindgen_futures::spawn_local(report_outcomes(
                loader,
                crate::resources::HttpSource,
                descriptors,
                proxy,
            ));
        }
    }
}

async fn report_outcomes<S: AssetSource>(
    loader: ModelLoader,
    source: S,
    descriptors: Vec<ModelDescriptor>,
    proxy: EventLoopProxy<FlowEvent>,
) {
    let mut outcomes = loader.load_each(&source, &descriptors);
    while let Some(outcome) = outcomes.next().await {
        if proxy.send_event(FlowEvent::Loaded(Box::new(outcome))).is_err() {
            log::error!("Event loop closed before the models were attached");
            return;
        }
    }
}

impl ApplicationHandler<FlowEvent> for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.state.is_some() {
            return;
        }

        #[allow(unused_mut)]
        let mut window_attributes = Window::default_attributes().with_title("CAB Viewer");

        #[cfg(target_arch = "wasm32")]
        {
            use wasm_bindgen::JsCast;
            use winit::platform::web::WindowAttributesExtWebSys;

            const CANVAS_ID: &str = "canvas";

            let canvas = web_sys::window()
                .and_then(|window| window.document())
                .and_then(|document| document.get_element_by_id(CANVAS_ID))
                .map(|canvas| canvas.unchecked_into());
            window_attributes = window_attributes.with_canvas(canvas);
        }

        let window = match event_loop.create_window(window_attributes) {
            Ok(window) => Arc::new(window),
            Err(err) => {
                log::error!("Unable to create a window: {err}");
                event_loop.exit();
                return;
            }
        };

        let init_future = AppState::new(window, self.viewer.config().clone());

        #[cfg(not(target_arch = "wasm32"))]
        {
            match self.async_runtime.block_on(init_future) {
                Ok(state) => {
                    let size = state.ctx.window().inner_size();
                    self.viewer.resize(size.width.max(1), size.height.max(1));
                    self.state = Some(state);
                    self.start_loading();
                }
                Err(err) => {
                    log::error!("Unable to initialise the renderer: {err:#}");
                    event_loop.exit();
                }
            }
        }

        #[cfg(target_arch = "wasm32")]
        {
            let proxy = self.proxy.clone();
            wasm_bindgen_futures::spawn_local(async move {
                let event = match init_future.await {
                    Ok(state) => FlowEvent::Initialized(Box::new(state)),
                    Err(err) => FlowEvent::Failed(err),
                };
                if proxy.send_event(event).is_err() {
                    log::error!("Event loop closed during initialisation");
                }
            });
        }
    }

    fn user_event(&mut self, event_loop: &ActiveEventLoop, event: FlowEvent) {
        match event {
            FlowEvent::Initialized(state) => {
                // The browser reports the canvas size only once the surface exists
                let size = state.ctx.window().inner_size();
                self.viewer.resize(size.width.max(1), size.height.max(1));
                state.ctx.window().request_redraw();
                self.state = Some(*state);
                self.start_loading();
            }
            FlowEvent::Loaded(outcome) => {
                self.viewer.attach(*outcome);
                if let Some(state) = &self.state {
                    state.ctx.window().request_redraw();
                }
            }
            FlowEvent::Failed(err) => {
                log::error!("Unable to initialise the renderer: {err:#}");
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _window_id: winit::window::WindowId, event: WindowEvent) {
        if self.state.is_none() {
            return;
        }

        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::Resized(size) => {
                if let Some(state) = &mut self.state {
                    state.resize(size.width, size.height, &mut self.viewer);
                }
            }
            WindowEvent::CursorMoved { position, .. } => {
                if self.orbiting {
                    let dx = (position.x - self.cursor.x) as f32;
                    let dy = (position.y - self.cursor.y) as f32;
                    self.viewer.orbit(dx, dy);
                }
                self.cursor = position;
                let ndc = self.ndc(position);
                self.viewer.pointer_moved(ndc);
            }
            WindowEvent::MouseInput { state: button_state, button, .. } => match (button, button_state) {
                (MouseButton::Left, ElementState::Pressed) => {
                    let ndc = self.ndc(self.cursor);
                    self.viewer.pointer_down(ndc);
                }
                (MouseButton::Left, ElementState::Released) => self.viewer.pointer_up(),
                (MouseButton::Right, pressed) => self.orbiting = pressed.is_pressed(),
                _ => (),
            },
            WindowEvent::MouseWheel { delta, .. } => {
                let amount = match delta {
                    MouseScrollDelta::LineDelta(_, y) => y,
                    MouseScrollDelta::PixelDelta(position) => (position.y / 50.0) as f32,
                };
                self.viewer.zoom(amount);
            }
            WindowEvent::Touch(touch) => {
                let ndc = self.ndc(touch.location);
                match touch.phase {
                    TouchPhase::Started => self.viewer.touch_start(ndc),
                    TouchPhase::Moved => self.viewer.pointer_moved(ndc),
                    TouchPhase::Ended | TouchPhase::Cancelled => self.viewer.touch_end(),
                }
            }
            WindowEvent::RedrawRequested => {
                let dt = self.last_time.elapsed();
                self.last_time = Instant::now();
                self.viewer.advance(dt);

                let Some(state) = &mut self.state else { return };
                match state.render(&self.viewer) {
                    Ok(()) => {}
                    // Reconfigure the surface if it's lost or outdated
                    Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                        let size = state.ctx.window().inner_size();
                        state.resize(size.width, size.height, &mut self.viewer);
                    }
                    Err(e) => log::error!("Unable to render {}", e),
                }
                state.ctx.window().request_redraw();
            }
            _ => {}
        }
    }
}

/// Opens a window and shows the given registry variant until the window is closed.
pub fn run(variant: Variant) -> anyhow::Result<()> {
    run_with_config(variant, ViewerConfig::default())
}

pub fn run_with_config(variant: Variant, config: ViewerConfig) -> anyhow::Result<()> {
    #[cfg(not(target_arch = "wasm32"))]
    {
        if let Err(e) = env_logger::try_init() {
            println!("Warning: Could not initialize logger: {}", e);
        };
    }

    #[cfg(target_arch = "wasm32")]
    {
        if let Err(e) = console_log::init_with_level(log::Level::Info) {
            web_sys::console::warn_1(&format!("Could not initialize logger: {e}").into());
        }
    }

    let event_loop: EventLoop<FlowEvent> = EventLoop::with_user_event().build()?;
    let mut app = App::new(&event_loop, variant, config)?;
    event_loop.run_app(&mut app)?;

    Ok(())
}

/// Browser entry point. The registry variant comes from the page's `?variant=` query parameter.
#[cfg(target_arch = "wasm32")]
#[wasm_bindgen(start)]
pub fn start() -> Result<(), JsValue> {
    let variant = web_sys::window()
        .and_then(|window| window.location().search().ok())
        .and_then(|search| {
            search
                .trim_start_matches('?')
                .split('&')
                .find_map(|pair| pair.strip_prefix("variant=").map(str::to_owned))
        })
        .and_then(|value| value.parse::<Variant>().ok())
        .unwrap_or_default();
    run(variant).map_err(|err| JsValue::from_str(&format!("{err:#}")))
}
