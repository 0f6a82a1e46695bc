use serial_test::serial;
use sparselife::{EngineConfig, LifeEngine, NaiveLife, Pattern, Point, SparseLifeEngine, ORIGIN};
use std::collections::HashSet;

fn engine(threads: usize) -> SparseLifeEngine {
    SparseLifeEngine::new(EngineConfig::default().threads(threads)).unwrap()
}

fn world(cells: &[(i64, i64)]) -> Vec<Point> {
    cells
        .iter()
        .map(|&(x, y)| {
            Point::new(
                ORIGIN.wrapping_add_signed(x as i32),
                ORIGIN.wrapping_add_signed(y as i32),
            )
        })
        .collect()
}

fn rel_set(pattern: &Pattern) -> HashSet<(i64, i64)> {
    pattern
        .points()
        .iter()
        .map(|p| {
            let (x, y) = p.rel(ORIGIN);
            (x as i64, y as i64)
        })
        .collect()
}

fn load(engine: &mut SparseLifeEngine, cells: &[(i64, i64)]) {
    engine.load_points(&world(cells));
}

/// Partition a population into 8-connected objects.
fn components(cells: &HashSet<(i64, i64)>) -> Vec<HashSet<(i64, i64)>> {
    let mut remaining = cells.clone();
    let mut objects = Vec::new();
    while let Some(&seed) = remaining.iter().next() {
        remaining.remove(&seed);
        let mut object = HashSet::new();
        let mut frontier = vec![seed];
        while let Some((x, y)) = frontier.pop() {
            object.insert((x, y));
            for dy in -1..=1 {
                for dx in -1..=1 {
                    let q = (x + dx, y + dy);
                    if remaining.remove(&q) {
                        frontier.push(q);
                    }
                }
            }
        }
        objects.push(object);
    }
    objects
}

#[derive(Debug, PartialEq, Eq)]
enum ObjectKind {
    StillLife,
    Blinker,
    Glider,
}

fn translated_one_diagonal(start: &HashSet<(i64, i64)>, end: &HashSet<(i64, i64)>) -> bool {
    if start.len() != end.len() {
        return false;
    }
    let corner = |s: &HashSet<(i64, i64)>| {
        let x = s.iter().map(|p| p.0).min().unwrap();
        let y = s.iter().map(|p| p.1).min().unwrap();
        (x, y)
    };
    let (sx, sy) = corner(start);
    let (ex, ey) = corner(end);
    let (dx, dy) = (ex - sx, ey - sy);
    dx.abs() == 1
        && dy.abs() == 1
        && start.iter().all(|&(x, y)| end.contains(&(x + dx, y + dy)))
}

/// Identify an isolated object by running it in the reference engine:
/// fixed point after one step, period-2 three-cell line, or a shape that
/// reappears translated one diagonal after four steps.
fn classify(object: &HashSet<(i64, i64)>) -> ObjectKind {
    let cells: Vec<(i64, i64)> = object.iter().copied().collect();
    let mut naive = NaiveLife::new();
    naive
        .load_pattern(&Pattern::from_points(world(&cells)))
        .unwrap();
    let start = rel_set(&naive.current_state());

    naive.step_n(1);
    if rel_set(&naive.current_state()) == start {
        return ObjectKind::StillLife;
    }
    naive.step_n(1);
    if rel_set(&naive.current_state()) == start && object.len() == 3 {
        return ObjectKind::Blinker;
    }
    naive.step_n(2);
    if translated_one_diagonal(&start, &rel_set(&naive.current_state())) {
        return ObjectKind::Glider;
    }
    panic!("unrecognised object: {cells:?}");
}

#[test]
fn blinker_oscillates_with_period_two() {
    let mut engine = engine(1);
    load(&mut engine, &[(0, 0), (1, 0), (2, 0)]);

    engine.step();
    assert_eq!(
        rel_set(&engine.current_state()),
        HashSet::from([(1, -1), (1, 0), (1, 1)])
    );
    assert_eq!(engine.births(), 2);
    assert_eq!(engine.deaths(), 2);

    engine.step();
    assert_eq!(
        rel_set(&engine.current_state()),
        HashSet::from([(0, 0), (1, 0), (2, 0)])
    );
    assert_eq!(engine.births(), 4);
    assert_eq!(engine.deaths(), 4);
}

#[test]
fn glider_translates_one_diagonal_per_period() {
    let glider = [(1, 0), (2, 1), (0, 2), (1, 2), (2, 2)];
    let mut engine = engine(2);
    load(&mut engine, &glider);

    engine.step_n(4);

    let shifted: HashSet<_> = glider.iter().map(|&(x, y)| (x + 1, y + 1)).collect();
    assert_eq!(rel_set(&engine.current_state()), shifted);
    assert_eq!(engine.births(), 12);
    assert_eq!(engine.deaths(), 12);
}

#[test]
fn block_is_a_fixed_point_and_goes_static() {
    let block = [(0, 0), (1, 0), (0, 1), (1, 1)];
    let mut engine = engine(2);
    load(&mut engine, &block);

    engine.step();
    assert_eq!(engine.births(), 0);
    assert_eq!(engine.deaths(), 0);
    // No events happened, so the block's tile must not be scheduled again.
    assert!(!engine.is_tile_active(ORIGIN, ORIGIN));

    engine.step_n(9);
    assert_eq!(rel_set(&engine.current_state()), block.into_iter().collect());
    assert_eq!(engine.births(), 0);
    assert_eq!(engine.deaths(), 0);
    // All four cells sat out those generations as statics.
    assert_eq!(engine.static_population(), 4);
}

#[test]
fn blinker_events_flag_the_boundary_tiles() {
    let mut engine = engine(1);
    load(&mut engine, &[(0, 0), (1, 0), (2, 0)]);

    engine.step();
    // Births at (1, -1) and (1, 1), deaths at (0, 0) and (2, 0): the home
    // tile and the tile north of it must both be flagged.
    assert!(engine.is_tile_active(ORIGIN, ORIGIN));
    assert!(engine.is_tile_active(ORIGIN, ORIGIN.wrapping_sub(1)));
    assert!(engine.is_tile_active(ORIGIN, ORIGIN + 1));
}

#[test]
fn lone_cell_dies_in_one_generation() {
    let mut engine = engine(1);
    load(&mut engine, &[(0, 0)]);
    engine.step();
    assert_eq!(engine.population(), 0);
    assert_eq!(engine.deaths(), 1);
}

#[test]
fn empty_world_is_a_stable_fixed_point() {
    let mut engine = engine(2);
    engine.step_n(10);
    assert_eq!(engine.population(), 0);
    assert_eq!(engine.births(), 0);
    assert_eq!(engine.generation(), 10);
}

#[test]
fn coordinates_wrap_across_the_torus_seam() {
    let mut engine = engine(1);
    // Horizontal blinker straddling x = 0.
    engine.load_points(&[
        Point::new(u32::MAX, ORIGIN),
        Point::new(0, ORIGIN),
        Point::new(1, ORIGIN),
    ]);

    engine.step();

    let expected: HashSet<Point> = [
        Point::new(0, ORIGIN - 1),
        Point::new(0, ORIGIN),
        Point::new(0, ORIGIN + 1),
    ]
    .into();
    let got: HashSet<Point> = engine.current_state().points().iter().copied().collect();
    assert_eq!(got, expected);
}

#[test]
#[serial]
fn r_pentomino_reaches_the_reference_census() {
    let mut engine = engine(4);
    load(&mut engine, &[(1, 0), (2, 0), (0, 1), (1, 1), (1, 2)]);

    engine.step_n(1103);

    // Standard reference value: the R-pentomino stabilises at generation
    // 1103 with 116 live cells.
    assert_eq!(engine.population(), 116);
    let sums = engine.births() as i64 - engine.deaths() as i64;
    assert_eq!(sums, 116 - 5);

    // The full census: 12 still lifes, 8 blinkers and 6 escaping gliders.
    let mut stills = 0;
    let mut blinkers = 0;
    let mut gliders = 0;
    for object in components(&rel_set(&engine.current_state())) {
        match classify(&object) {
            ObjectKind::StillLife => stills += 1,
            ObjectKind::Blinker => blinkers += 1,
            ObjectKind::Glider => gliders += 1,
        }
    }
    assert_eq!(stills, 12);
    assert_eq!(blinkers, 8);
    assert_eq!(gliders, 6);
}

#[test]
#[serial]
fn point_sets_match_across_thread_counts() {
    let glider = [(1, 0), (2, 1), (0, 2), (1, 2), (2, 2)];
    let run = |threads: usize| {
        let mut engine = engine(threads);
        load(&mut engine, &glider);
        engine.step_n(1000);
        rel_set(&engine.current_state())
    };

    assert_eq!(run(1), run(8));
}

#[test]
#[serial]
fn tracks_the_naive_reference_on_random_soup() {
    let soup = Pattern::random(48, 48, 0.3, Some(0xD37E_A515));
    let mut engine = engine(4);
    let mut naive = NaiveLife::new();
    engine.load_pattern(&soup).unwrap();
    naive.load_pattern(&soup).unwrap();

    let mut prev_pop = engine.population() as i64;
    for generation in 1..=32 {
        let prev_births = engine.births() as i64;
        let prev_deaths = engine.deaths() as i64;
        engine.step();
        naive.step_n(1);

        assert_eq!(
            rel_set(&engine.current_state()),
            rel_set(&naive.current_state()),
            "diverged at generation {generation}"
        );

        // Bookkeeping invariant: births - deaths balance the population.
        let pop = engine.population() as i64;
        let births = engine.births() as i64 - prev_births;
        let deaths = engine.deaths() as i64 - prev_deaths;
        assert_eq!(births - deaths, pop - prev_pop);
        prev_pop = pop;
    }
}

#[test]
#[serial]
fn snapshot_reload_reproduces_the_run() {
    let soup = Pattern::random(32, 32, 0.35, Some(42));
    let mut engine_a = engine(4);
    engine_a.load_pattern(&soup).unwrap();
    engine_a.step_n(10);

    let snapshot = engine_a.current_state();
    engine_a.step_n(10);

    let mut engine_b = engine(4);
    engine_b.load_pattern(&snapshot).unwrap();
    engine_b.step_n(10);

    assert_eq!(
        rel_set(&engine_a.current_state()),
        rel_set(&engine_b.current_state())
    );
}

#[test]
fn static_regions_skip_arena_work_but_stay_correct() {
    // A block far away from an active blinker: once settled, the block
    // must be carried as static while the blinker keeps cycling.
    let mut engine = engine(2);
    let mut cells = vec![(0, 0), (1, 0), (0, 1), (1, 1)];
    cells.extend_from_slice(&[(40, 40), (41, 40), (42, 40)]);
    load(&mut engine, &cells);

    engine.step_n(6);

    let state = rel_set(&engine.current_state());
    assert!(state.contains(&(0, 0)), "block must survive");
    assert_eq!(state.len(), 7);
    assert_eq!(engine.static_population(), 4);
}

#[test]
fn reload_resets_counters() {
    let mut engine = engine(2);
    load(&mut engine, &[(0, 0), (1, 0), (2, 0)]);
    engine.step_n(3);
    assert!(engine.births() > 0);

    load(&mut engine, &[(0, 0)]);
    assert_eq!(engine.generation(), 0);
    assert_eq!(engine.births(), 0);
    assert_eq!(engine.population(), 1);
}
