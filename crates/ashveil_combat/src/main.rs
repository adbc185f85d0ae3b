//! Headless combat demo.
//!
//! Запускает Bevy App без рендера: один контролируемый боец против двух
//! противников, скриптованный ввод, печать состояния каждые 100 тиков.

use bevy::prelude::*;
use ashveil_combat::{
    create_headless_app, spawn_adversary, spawn_player, PlayerInput, SimulationPlugin, Vitality,
    VitalityConfig,
};

fn main() {
    let seed = 42;
    println!("Starting Ashveil headless combat demo (seed: {})", seed);

    let mut app = create_headless_app(seed);
    app.add_plugins(SimulationPlugin);

    let player = spawn_player(&mut app.world_mut().commands(), Vec3::ZERO);
    spawn_adversary(
        &mut app.world_mut().commands(),
        Vec3::new(0.0, 0.0, -2.0),
        VitalityConfig {
            spawn_health: 300,
            ..Default::default()
        },
    );
    spawn_adversary(
        &mut app.world_mut().commands(),
        Vec3::new(3.0, 0.0, -4.0),
        VitalityConfig::default(),
    );

    for tick in 0..600 {
        // Scripted input: walk forward, swing every second for a tenth of it
        if let Some(mut input) = app.world_mut().get_mut::<PlayerInput>(player) {
            input.move_dir = Vec3::NEG_Z;
            input.move_amount = 1.0;
            input.rb = tick % 60 < 6;
        }

        app.update();

        if tick % 100 == 0 {
            let mut query = app.world_mut().query::<(Entity, &Vitality)>();
            for (entity, vitality) in query.iter(app.world()) {
                println!(
                    "Tick {}: adversary {:?} health {} poise {:.1} dead {}",
                    tick, entity, vitality.health, vitality.poise, vitality.is_dead
                );
            }
        }
    }

    println!("Demo complete!");
}
