use std::sync::Arc;

use flecs_ecs::prelude::*;
use lumen_core::{App, Input, Plugin, viewport::Viewport};
use winit::{
    application::ApplicationHandler,
    event::{DeviceEvent, ElementState, KeyEvent, WindowEvent},
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    window::{Window, WindowId},
};

#[derive(Component)]
pub struct MainWindow(pub Arc<Window>);

#[derive(Debug, thiserror::Error)]
pub enum WindowError {
    #[error("failed to create the event loop")]
    EventLoop(#[from] winit::error::EventLoopError),
}

pub struct WindowPlugin;

impl Plugin for WindowPlugin {
    fn build(&self, app: &mut App) {
        app.world
            .component::<MainWindow>()
            .add_trait::<flecs::Singleton>();
    }
}

// The State Machine that holds the App while waiting for the OS
struct LumenRunner {
    app: App,
    title: String,
    window: Option<Arc<Window>>,
}

impl LumenRunner {
    pub fn new(app: App, title: &str) -> Self {
        Self {
            app,
            title: title.to_string(),
            window: None,
        }
    }
}

impl ApplicationHandler for LumenRunner {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let attributes = Window::default_attributes().with_title(self.title.clone());
        let window = match event_loop.create_window(attributes) {
            Ok(window) => Arc::new(window),
            Err(err) => {
                log::error!("Could not create the main window: {err}");
                event_loop.exit();
                return;
            }
        };

        let size = window.inner_size();
        self.app
            .world
            .get::<&mut Viewport>(|viewport| viewport.resize(size.width, size.height));
        self.app.world.set(MainWindow(window.clone()));
        self.window = Some(window);
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }

    fn device_event(
        &mut self,
        _event_loop: &ActiveEventLoop,
        _device_id: winit::event::DeviceId,
        event: DeviceEvent,
    ) {
        if let DeviceEvent::MouseMotion { delta } = event {
            self.app
                .world
                .get::<&mut Input>(|input| input.accumulate_mouse(delta.0 as f32, delta.1 as f32));
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _window_id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: winit::keyboard::PhysicalKey::Code(code),
                        state,
                        ..
                    },
                ..
            } => {
                self.app.world.get::<&mut Input>(|input| match state {
                    ElementState::Pressed => input.press(code),
                    ElementState::Released => input.release(code),
                });
            }
            WindowEvent::MouseInput { state, .. } => {
                self.app
                    .world
                    .get::<&mut Input>(|input| input.mouse_button(state == ElementState::Pressed));
            }
            WindowEvent::Focused(false) => {
                // reset keys so they don't get stuck (e.g. on alt + tab)
                self.app.world.get::<&mut Input>(|input| input.reset());
            }
            WindowEvent::Resized(size) => {
                self.app
                    .world
                    .get::<&mut Viewport>(|viewport| viewport.resize(size.width, size.height));
            }
            WindowEvent::CloseRequested => {
                log::info!("The close button was pressed; stopping");
                self.app.shutdown();
                event_loop.exit();
            }
            WindowEvent::RedrawRequested => {
                self.app.update();

                if !self.app.running {
                    event_loop.exit();
                    return;
                }

                if let Some(window) = &self.window {
                    window.request_redraw();
                }
            }
            _ => (),
        }
    }
}

pub fn run_lumen_app(app: App, title: &str) -> Result<(), WindowError> {
    let event_loop = EventLoop::new()?;

    // ControlFlow::Poll continuously runs the event loop, even if the OS hasn't
    // dispatched any events. This is ideal for games and similar applications.
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut runner = LumenRunner::new(app, title);

    event_loop.run_app(&mut runner)?;
    Ok(())
}
