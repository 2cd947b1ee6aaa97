//! Integration tests: pick pass → pick buffer → decode → target selection.
//!
//! Graphs are drawn with vertex x/y in pick-buffer pixels so the expected
//! hit can be read straight off the coordinates.

use pretty_assertions::assert_eq;
use rsg_core::*;
use rsg_pick::*;
use std::cell::RefCell;
use std::rc::Rc;

fn init_logs() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn square(x: f32, y: f32, size: f32, z: f32, part: u32) -> VertexList {
    VertexList::new(
        Primitive::Quads,
        vec![[x, y, z], [x + size, y, z], [x + size, y + size, z], [x, y + size, z]],
    )
    .with_parts(vec![part; 4])
}

/// Run one pick pass over `root` and resolve the hit at `(x, y)`.
fn pick_at(root: &Handle, x: usize, y: usize) -> (Option<PickEntry>, ApplyContext) {
    let buffer = Rc::new(RefCell::new(PickBuffer::new(32, 32)));
    let mut ctx = ApplyContext::new(buffer.clone());
    let mut session = PickSession::new();

    assert!(session.request(x, y));
    assert!(session.begin_draw());
    ctx.begin(ApplyMode::Pick, RenderPass::default());
    root.apply(ApplyMode::Pick, &mut ctx).unwrap();
    assert!(session.sampled(buffer.borrow().sample(x, y, SAMPLE_HALF_EXTENT)));
    let entry = session.resolve(&mut ctx.names).cloned();
    (entry, ctx)
}

#[test]
fn nearest_drawable_is_picked_with_its_full_path() {
    init_logs();
    let repo = Repository::new();
    let root = repo.insert(NodeList::new());
    let back = repo.insert(Scene::named("back").pickable());
    let front = repo.insert(Scene::named("front").pickable());
    let far = repo.insert(square(0.0, 0.0, 20.0, 0.8, 1));
    let near = repo.insert(square(4.0, 4.0, 6.0, 0.2, 7));

    // Front is traversed first; depth, not order, decides.
    front.with_as_mut::<Scene, _>(|s| s.add(&near));
    back.with_as_mut::<Scene, _>(|s| s.add(&far));
    root.with_as_mut::<NodeList, _>(|l| {
        l.add(&front);
        l.add(&back);
    });

    let (entry, _) = pick_at(&root, 7, 7);
    let entry = entry.unwrap();
    let expected: Vec<NodeUid> = [&root, &front, &near].iter().filter_map(|h| h.uid()).collect();
    assert_eq!(entry.path, expected);
    assert_eq!(entry.part_id, 7);

    let (entry, _) = pick_at(&root, 18, 18);
    let entry = entry.unwrap();
    assert_eq!(entry.part_id, 1);
    assert_eq!(entry.path.get(1).copied(), back.uid());
}

#[test]
fn empty_area_is_no_pick() {
    let repo = Repository::new();
    let root = repo.insert(NodeList::new());
    let scene = repo.insert(Scene::new().pickable());
    let sq = repo.insert(square(0.0, 0.0, 4.0, 0.5, 0));
    scene.with_as_mut::<Scene, _>(|s| s.add(&sq));
    root.with_as_mut::<NodeList, _>(|l| l.add(&scene));

    let (entry, mut ctx) = pick_at(&root, 25, 25);
    assert_eq!(entry, None);
    let update = update_current_pick(&mut ctx.current_pick, &repo.downgrade(), None);
    assert!(!update.changed);
}

#[test]
fn hits_under_unpickable_scenes_are_dropped() {
    let repo = Repository::new();
    let root = repo.insert(NodeList::new());
    let scene = repo.insert(Scene::new());
    let sq = repo.insert(square(0.0, 0.0, 8.0, 0.5, 2));
    scene.with_as_mut::<Scene, _>(|s| s.add(&sq));
    root.with_as_mut::<NodeList, _>(|l| l.add(&scene));

    let (entry, mut ctx) = pick_at(&root, 3, 3);
    assert!(entry.is_some());
    let r = repo.downgrade();
    let update = update_current_pick(&mut ctx.current_pick, &r, entry.as_ref());
    assert!(!update.changed);
    assert!(ctx.current_pick.is_empty());
}

#[test]
fn tool_inside_clickable_scene_takes_the_click() {
    let repo = Repository::new();
    let root = repo.insert(NodeList::new());
    let mut panel = Scene::named("panel").pickable();
    panel.pick.notify_click = true;
    let panel = repo.insert(panel);
    let mut slider = Tool::new("slider");
    slider.scene_mut().enable_drag(DragChannel::Left, true);
    let slider = repo.insert(slider);
    let knob = repo.insert(square(2.0, 2.0, 6.0, 0.3, 5));

    slider.with_as_mut::<Tool, _>(|t| t.scene_mut().add(&knob));
    panel.with_as_mut::<Scene, _>(|s| s.add(&slider));
    root.with_as_mut::<NodeList, _>(|l| l.add(&panel));

    let (entry, _) = pick_at(&root, 4, 4);
    let entry = entry.unwrap();
    let candidates = scene_candidates(&repo.downgrade(), &entry.path);
    let ids: Vec<NodeUid> = candidates.iter().map(|c| c.uid).collect();
    assert_eq!(ids, [&slider, &panel].iter().filter_map(|h| h.uid()).collect::<Vec<_>>());

    assert_eq!(
        select_target(&candidates, MouseEventKind::Click, Some(DragChannel::Left)),
        slider.uid().map(|u| (u, PickReason::Tool))
    );
    assert_eq!(
        select_target(&candidates, MouseEventKind::Click, Some(DragChannel::Right)),
        panel.uid().map(|u| (u, PickReason::NotifyClick))
    );
}

#[test]
fn stale_pick_colors_from_a_previous_pass_are_rejected() {
    let repo = Repository::new();
    let root = repo.insert(NodeList::new());
    let scene = repo.insert(Scene::new().pickable());
    let sq = repo.insert(square(0.0, 0.0, 8.0, 0.5, 0));
    scene.with_as_mut::<Scene, _>(|s| s.add(&sq));
    root.with_as_mut::<NodeList, _>(|l| l.add(&scene));

    let (entry, mut ctx) = pick_at(&root, 2, 2);
    assert!(entry.is_some());

    // A later pass that stored nothing cannot explain the old color.
    ctx.begin(ApplyMode::Pick, RenderPass::default());
    let stale = PickSample {
        color: PickColor::encode(0, 0),
        depth: 0.5,
    };
    assert_eq!(decode_sample(&stale, &mut ctx.names), None);
}
