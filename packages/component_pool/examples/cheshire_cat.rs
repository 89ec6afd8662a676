//! A small scene driven through a `ComponentPool`:
//!
//! * Creating components that know their own handle.
//! * Updating and committing once per frame.
//! * Putting a component to sleep and waking it up again.
//! * Deleting a component.

use component_pool::{Component, ComponentPool, Handle, UpdateContext};

struct CheshireCat {
    owner: u32,
    smiling: bool,
    me: Handle<CheshireCat>,
}

impl Component for CheshireCat {
    fn update(&mut self, _delta_time: f32, _ctx: &UpdateContext<'_, Self>) {
        if self.smiling {
            println!(
                "CheshireCat: owner={} A sinister grin emerges from the trees.",
                self.owner
            );
        } else {
            println!(
                "CheshireCat: owner={} Alice senses a presence in the dark.",
                self.owner
            );
        }
    }
}

fn frame(pool: &mut ComponentPool<CheshireCat>, label: &str) {
    println!("--- {label} ---");

    pool.update(0.25);
    let summary = pool.commit();

    println!(
        "{} active, {} sleeping ({} deleted, {} woken, {} slept)",
        pool.active_count(),
        pool.sleeping_count(),
        summary.deleted(),
        summary.woken(),
        summary.slept()
    );
}

fn main() {
    let mut pool = ComponentPool::with_capacity(8);

    let spawn = |pool: &mut ComponentPool<CheshireCat>, owner: u32, smiling: bool| {
        pool.create_with(|me| CheshireCat {
            owner,
            smiling,
            me: me.clone(),
        })
        .expect("the pool has room for every cat in this scene")
    };

    let _first = spawn(&mut pool, 1, true);
    let second = spawn(&mut pool, 2, false);
    let third = spawn(&mut pool, 3, false);

    frame(&mut pool, "all cats awake");

    pool.set_active(&third, false)
        .expect("the third cat was just created");
    frame(&mut pool, "third cat asleep");

    pool.delete(&second).expect("the second cat is still around");
    frame(&mut pool, "second cat gone");

    println!("second cat handle still valid: {}", second.is_valid());

    pool.set_active(&third, true)
        .expect("the third cat is still around");
    frame(&mut pool, "third cat awake again");

    // Every cat can find itself through its own handle.
    for cat in &pool {
        let found = pool.get(&cat.me).expect("cats never lose track of themselves");
        println!("cat {} found itself: {}", cat.owner, found.owner == cat.owner);
    }
}
