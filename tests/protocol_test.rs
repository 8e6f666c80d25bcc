//! Line protocol scenarios, driven without a socket.

use barbershop::engine::Engine;
use barbershop::protocol::{Reply, handle_line};

fn run(engine: &mut Engine, line: &str) -> String {
    handle_line(engine, line).render()
}

#[test]
fn update_next_scenario() {
    let mut engine = Engine::new();

    assert_eq!(run(&mut engine, "update 1 5\r\n"), "OK\r\n");
    assert_eq!(run(&mut engine, "update 2 7\r\n"), "OK\r\n");
    assert_eq!(run(&mut engine, "update 1 10\r\n"), "OK\r\n");
    assert_eq!(run(&mut engine, "next\r\n"), "1\r\n");
    assert_eq!(run(&mut engine, "next\r\n"), "2\r\n");
    assert_eq!(run(&mut engine, "next\r\n"), "-1\r\n");
}

#[test]
fn negative_delta_scenario_shows_one_item() {
    let mut engine = Engine::new();

    assert_eq!(run(&mut engine, "update 9 3\n"), "OK\r\n");
    assert_eq!(run(&mut engine, "update 9 -1\n"), "OK\r\n");

    let Reply::Stats(stats) = handle_line(&mut engine, "stats\n") else {
        panic!("expected stats reply");
    };
    assert_eq!(stats.items, 1);
    assert_eq!(stats.updates, 2);
    assert_eq!(engine.score_of(barbershop::ItemId(9)), Some(2));
}

#[test]
fn stats_block_ends_with_end() {
    let mut engine = Engine::new();
    run(&mut engine, "update 4 1");
    run(&mut engine, "update 5 2");
    run(&mut engine, "next");

    let out = run(&mut engine, "stats");
    let lines: Vec<_> = out.split("\r\n").filter(|l| !l.is_empty()).collect();
    assert_eq!(lines.len(), 8);
    assert!(lines[0].starts_with("STAT uptime "));
    assert!(lines[1].starts_with("STAT version "));
    assert_eq!(lines[2], "STAT updates 2");
    assert_eq!(lines[3], "STAT items 1");
    assert_eq!(lines[4], "STAT pools 1");
    assert_eq!(lines[5], "STAT pools_gc 1");
    assert_eq!(lines[6], "STAT items_gc 1");
    assert_eq!(lines[7], "END");
}

#[test]
fn malformed_commands_get_error_and_change_nothing() {
    let mut engine = Engine::new();

    for line in [
        "update 1",
        "update one 2",
        "update 1 two",
        "update 1 2 3",
        "update -5 2",
        "next please",
        "flush_all",
        "",
        "\r\n",
    ] {
        assert_eq!(run(&mut engine, line), "ERROR\r\n", "line {line:?}");
    }

    assert_eq!(engine.updates(), 0);
    assert!(engine.is_empty());
}

#[test]
fn quit_closes_without_reply() {
    let mut engine = Engine::new();
    assert_eq!(handle_line(&mut engine, "quit\r\n"), Reply::Close);
}
