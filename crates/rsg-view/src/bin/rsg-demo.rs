//! RSG demo: builds a small pickable scene, feeds it a scripted pointer
//! session from a second thread, and prints the resulting pick events as
//! JSON lines.
//!
//! Usage: `rsg-demo [config.json]`

use rsg_core::{Color, DragChannel, Primitive, RecordingSink, Scene, Tool, VertexList};
use rsg_view::{InputEvent, MouseButton, View, ViewConfig, VisChannel, VisRequest};
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn square(x: f32, y: f32, size: f32, z: f32, color: Color, part: u32) -> VertexList {
    VertexList::new(
        Primitive::Quads,
        vec![[x, y, z], [x + size, y, z], [x + size, y + size, z], [x, y + size, z]],
    )
    .with_color(color)
    .with_parts(vec![part; 4])
}

fn build_scene(view: &mut View) {
    let repo = view.repository();
    let root = repo.insert(Scene::named("root"));

    let mut board = Scene::named("board").pickable();
    board.pick.notify_click = true;
    board.pick.notify_over = true;
    let board = repo.insert(board);
    let tiles = [
        repo.insert(square(0.0, 0.0, 200.0, 0.9, Color::rgba(0.2, 0.2, 0.2, 1.0), 0)),
        repo.insert(square(220.0, 0.0, 200.0, 0.9, Color::rgba(0.2, 0.4, 0.2, 1.0), 1)),
    ];

    let mut knob = Tool::new("knob").on_event(|uid, part| log::info!("tool {uid} hit on part {part}"));
    knob.scene_mut().enable_drag(DragChannel::Left, true);
    let knob = repo.insert(knob);
    let cap = repo.insert(square(80.0, 80.0, 40.0, 0.3, Color::rgba(0.9, 0.6, 0.1, 0.8), 0));

    knob.with_as_mut::<Tool, _>(|t| t.scene_mut().add(&cap));
    board.with_as_mut::<Scene, _>(|s| {
        for t in &tiles {
            s.add(t);
        }
        s.add(&knob);
    });
    root.with_as_mut::<Scene, _>(|s| s.add(&board));
    view.set_root(&root);
}

fn scripted_pointer(channel: &VisChannel) {
    let events = [
        InputEvent::PointerMove { x: 300.0, y: 50.0, time_ms: 0 },
        InputEvent::PointerDown {
            x: 300.0,
            y: 50.0,
            button: MouseButton::Left,
            ctrl: false,
            time_ms: 40,
        },
        InputEvent::PointerUp {
            x: 300.0,
            y: 50.0,
            button: MouseButton::Left,
            time_ms: 90,
        },
        InputEvent::PointerDown {
            x: 100.0,
            y: 100.0,
            button: MouseButton::Left,
            ctrl: false,
            time_ms: 500,
        },
        InputEvent::PointerMove { x: 110.0, y: 104.0, time_ms: 540 },
        InputEvent::PointerUp {
            x: 112.0,
            y: 104.0,
            button: MouseButton::Left,
            time_ms: 900,
        },
    ];
    for e in events {
        channel.post(VisRequest::Mouse(e), false);
    }
    channel.post(VisRequest::Redisplay, true);
    channel.close();
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let config = match std::env::args().nth(1) {
        Some(path) => ViewConfig::load(path)?,
        None => ViewConfig::default(),
    };
    let sink = Rc::new(RefCell::new(RecordingSink::default()));
    let mut view = View::new(config, sink.clone());
    build_scene(&mut view);

    let channel = Arc::new(VisChannel::new());
    let ui = {
        let channel = Arc::clone(&channel);
        thread::spawn(move || scripted_pointer(&channel))
    };

    while !channel.is_closed() {
        for event in view.process(&channel)? {
            println!("{}", serde_json::to_string(&event)?);
        }
        thread::sleep(Duration::from_millis(2));
    }
    if ui.join().is_err() {
        log::error!("pointer thread panicked");
    }

    log::info!(
        "{} frames, {} draw calls in the last one",
        sink.borrow().frames,
        sink.borrow().calls.len()
    );
    Ok(())
}
