use flyby_cull::{app, MonoView, ObjectDesc};

fn main() -> anyhow::Result<()> {
    let objects = vec![
        ObjectDesc::new("earth.obj", "earth.png", 1.0, [10.0, 0.0, 0.0]),
        ObjectDesc::new("earth.obj", "earth.png", 3.0, [-10.0, 0.0, 0.0]),
        ObjectDesc::new("tiger.obj", "tigeratlas.jpg", 1.0, [0.0, 0.0, -5.0]),
    ];

    app::run(objects, Box::new(MonoView))
}
