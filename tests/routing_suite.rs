use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::ops::ControlFlow;
use std::path::Path;

use rectilinear_router::geometry::{Polygon, Rect, close, compare_points};
use rectilinear_router::obstacle::{Obstacle, ObstacleId, ObstacleTree};
use rectilinear_router::visibility::{self, OVERLAPPED_WEIGHT};
use rectilinear_router::{
    EdgeRequest, EndpointRef, Point, RoutedEdge, Router, RouterConfig, RouterError, Scene, Shape, build_router,
};

fn fixture(name: &str) -> Scene {
    let path = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name);
    Scene::load(&path).expect("fixture load failed")
}

fn route_all(router: &mut Router, edges: &[EdgeRequest]) -> Vec<RoutedEdge> {
    router
        .route_edges(edges, |_, _| ControlFlow::Continue(()))
        .expect("routing failed")
}

fn port(shape: &str, port: &str) -> EndpointRef {
    EndpointRef::Port {
        shape: shape.to_string(),
        port: port.to_string(),
    }
}

fn free_edge(id: &str, a: (f64, f64), b: (f64, f64), waypoints: &[(f64, f64)]) -> EdgeRequest {
    EdgeRequest {
        id: id.to_string(),
        source: EndpointRef::Point(Point::new(a.0, a.1)),
        target: EndpointRef::Point(Point::new(b.0, b.1)),
        waypoints: waypoints.iter().map(|(x, y)| Point::new(*x, *y)).collect(),
    }
}

fn assert_rectilinear(route: &RoutedEdge) {
    for w in route.points.windows(2) {
        assert!(
            close(w[0].x, w[1].x) || close(w[0].y, w[1].y),
            "{}: diagonal step {:?} -> {:?}",
            route.id,
            w[0],
            w[1]
        );
    }
}

fn assert_avoids_obstacles(router: &mut Router, route: &RoutedEdge) {
    let tree = router.obstacle_tree().expect("tree");
    for obstacle in tree.obstacles().iter().filter(|o| !o.is_group) {
        for w in route.points.windows(2) {
            assert!(
                !obstacle.input.crosses_interior(w[0], w[1]),
                "{}: step {:?} -> {:?} crosses shape {}",
                route.id,
                w[0],
                w[1],
                obstacle.shape
            );
        }
    }
}

#[test]
fn route_all_fixtures() {
    let fixtures = ["row.json", "groups.json", "slopes.json", "waypoints.json"];
    for name in fixtures {
        for sparse in [false, true] {
            let scene = fixture(name);
            let config = RouterConfig {
                use_sparse_visibility_graph: sparse,
                ..RouterConfig::default()
            };
            let mut router = build_router(&scene, config).expect("router");
            let routes = route_all(&mut router, &scene.edge_requests());
            assert_eq!(routes.len(), scene.edges.len(), "{name}: missing routes");
            for route in &routes {
                assert!(route.points.len() >= 2, "{name}/{}: empty route", route.id);
                assert_eq!(route.bends, route.points.len() - 2);
                assert_rectilinear(route);
                assert_avoids_obstacles(&mut router, route);
            }
        }
    }
}

#[test]
fn graph_edges_are_axis_aligned_and_ordered() {
    for sparse in [false, true] {
        let scene = fixture("slopes.json");
        let config = RouterConfig {
            use_sparse_visibility_graph: sparse,
            ..RouterConfig::default()
        };
        let mut router = build_router(&scene, config).expect("router");
        let graph = router.visibility_graph().expect("graph");
        assert!(graph.edge_count() > 0);
        for (_, edge) in graph.edges() {
            let (a, b) = (graph.point(edge.source), graph.point(edge.target));
            assert!(close(a.x, b.x) || close(a.y, b.y), "diagonal edge {a:?} -> {b:?}");
            assert_eq!(compare_points(a, b), Ordering::Less, "edge {a:?} -> {b:?} runs backwards");
        }
    }
}

#[test]
fn overlap_resolution_is_idempotent() {
    let shapes = [
        Polygon::rectangle(&Rect::new(0.0, 0.0, 10.0, 10.0)),
        Polygon::rectangle(&Rect::new(6.0, 6.0, 16.0, 16.0)),
        Polygon::from_points([
            Point::new(30.0, 0.0),
            Point::new(35.0, 5.0),
            Point::new(30.0, 10.0),
            Point::new(25.0, 5.0),
        ])
        .expect("diamond"),
        Polygon::rectangle(&Rect::new(31.0, 2.0, 40.0, 8.0)),
    ];
    let obstacles = shapes
        .into_iter()
        .enumerate()
        .map(|(i, p)| Obstacle::new(ObstacleId(i), i, p, 1.0, false, false))
        .collect();
    let mut tree = ObstacleTree::create(obstacles, Vec::<BTreeSet<ObstacleId>>::new());
    let resolved = tree.clone();
    tree.resolve_overlaps();
    assert_eq!(tree, resolved);
    assert_eq!(
        visibility::generate(&tree, false).expect("graph").graph,
        visibility::generate(&resolved, false).expect("graph").graph
    );
}

#[test]
fn routing_leaves_the_graph_as_it_was() {
    let scene = fixture("row.json");
    let mut router = build_router(&scene, RouterConfig::default()).expect("router");
    let before = router.visibility_graph().expect("graph").clone();
    route_all(&mut router, &scene.edge_requests());
    let after = router.visibility_graph().expect("graph");
    assert_eq!(after.vertex_count(), before.vertex_count());
    assert_eq!(after.edge_count(), before.edge_count());
    assert_eq!(*after, before);
}

#[test]
fn unobstructed_route_is_straight_and_shortest() {
    let mut router = Router::default();
    router.add_shape(Shape::rectangle("sw", -10.0, -10.0, -5.0, -5.0)).expect("add");
    router.add_shape(Shape::rectangle("ne", 90.0, 40.0, 95.0, 45.0)).expect("add");
    let routes = route_all(&mut router, &[free_edge("e", (0.0, 20.0), (80.0, 20.0), &[])]);
    assert_eq!(routes[0].bends, 0);
    assert_eq!(routes[0].length, 80.0);
    assert_eq!(routes[0].points, vec![Point::new(0.0, 20.0), Point::new(80.0, 20.0)]);
}

#[test]
fn waypoints_are_visited_in_order() {
    let scene = fixture("waypoints.json");
    let mut router = build_router(&scene, RouterConfig::default()).expect("router");
    let routes = route_all(&mut router, &scene.edge_requests());
    let points = &routes[0].points;
    let first = points.iter().position(|p| *p == Point::new(15.0, 40.0));
    let second = points.iter().position(|p| *p == Point::new(45.0, 2.0));
    assert!(
        matches!((first, second), (Some(a), Some(b)) if a < b),
        "waypoints out of order in {points:?}"
    );
}

#[test]
fn blocked_ports_route_with_two_bends() {
    let mut router = Router::default();
    let shapes = [
        Shape::rectangle("a", 0.0, 0.0, 10.0, 10.0).with_port("p", Point::new(5.0, 5.0)),
        Shape::rectangle("b", 30.0, 20.0, 40.0, 30.0).with_port("p", Point::new(35.0, 25.0)),
        Shape::rectangle("wall", 15.0, -20.0, 25.0, 50.0),
        Shape::rectangle("sw", -50.0, -50.0, -45.0, -45.0),
        Shape::rectangle("ne", 80.0, 80.0, 85.0, 85.0),
    ];
    for shape in shapes {
        router.add_shape(shape).expect("add");
    }
    let edge = EdgeRequest {
        id: "ab".to_string(),
        source: port("a", "p"),
        target: port("b", "p"),
        waypoints: Vec::new(),
    };
    let routed = router.route_edge(&edge).expect("route");
    assert_eq!(routed.bends, 2, "route {:?}", routed.points);
    assert_avoids_obstacles(&mut router, &routed);
}

#[test]
fn two_blockers_are_passed_around_together() {
    let mut router = Router::default();
    let shapes = [
        Shape::rectangle("a", 0.0, 0.0, 10.0, 10.0).with_port("p", Point::new(5.0, 5.0)),
        Shape::rectangle("w1", 20.0, -5.0, 30.0, 15.0),
        Shape::rectangle("w2", 35.0, -10.0, 45.0, 20.0),
        Shape::rectangle("c", 60.0, 0.0, 70.0, 10.0).with_port("p", Point::new(65.0, 5.0)),
    ];
    for shape in shapes {
        router.add_shape(shape).expect("add");
    }
    let edge = EdgeRequest {
        id: "ac".to_string(),
        source: port("a", "p"),
        target: port("c", "p"),
        waypoints: Vec::new(),
    };
    let routed = router.route_edge(&edge).expect("route");
    assert_eq!(routed.bends, 2, "route {:?}", routed.points);
    assert_avoids_obstacles(&mut router, &routed);
}

#[test]
fn touching_shapes_share_an_overlapped_border() {
    let mut router = Router::default();
    router.add_shape(Shape::rectangle("a", 0.0, 0.0, 10.0, 10.0)).expect("add");
    router.add_shape(Shape::rectangle("b", 12.0, 0.0, 22.0, 10.0)).expect("add");
    let tree = router.obstacle_tree().expect("tree");
    let on_border = Point::new(11.0, 5.0);
    assert!(tree.point_inside_obstacle(on_border));
    assert_eq!(tree.obstacles_containing(on_border).len(), 2);
    let graph = router.visibility_graph().expect("graph");
    let shared = graph.edges().any(|(_, e)| {
        let (a, b) = (graph.point(e.source), graph.point(e.target));
        close(a.x, 11.0) && close(b.x, 11.0) && a.y > -1.0 && b.y < 11.0 && e.weight >= OVERLAPPED_WEIGHT
    });
    assert!(shared);
}

#[test]
fn group_members_route_inside_and_out() {
    let scene = fixture("groups.json");
    let mut router = build_router(&scene, RouterConfig::default()).expect("router");
    let routes = route_all(&mut router, &scene.edge_requests());
    let group = Rect::new(-1.0, -1.0, 61.0, 41.0);
    let inside = &routes[0];
    assert!(inside.points.iter().all(|p| group.contains_point(*p)), "{:?}", inside.points);
    let outward = &routes[1];
    assert!(outward.points.iter().any(|p| !group.contains_point(*p)));
}

#[test]
fn route_to_center_ends_at_port_locations() {
    let scene = fixture("row.json");
    let config = RouterConfig {
        route_to_center: true,
        ..RouterConfig::default()
    };
    let mut router = build_router(&scene, config).expect("router");
    let routes = route_all(&mut router, &scene.edge_requests()[..1]);
    assert_eq!(routes[0].points.first(), Some(&Point::new(5.0, 5.0)));
    assert_eq!(routes[0].points.last(), Some(&Point::new(35.0, 10.0)));
}

#[test]
fn obstacle_rectangles_and_limited_splicing_still_route() {
    let scene = fixture("slopes.json");
    let config = RouterConfig {
        use_obstacle_rectangles: true,
        limit_port_visibility_splice: true,
        ..RouterConfig::default()
    };
    let mut router = build_router(&scene, config).expect("router");
    let routes = route_all(&mut router, &scene.edge_requests());
    for route in &routes {
        assert_rectilinear(route);
        assert_avoids_obstacles(&mut router, route);
    }
}

#[test]
fn waypoints_on_endpoints_keep_the_route_clear() {
    let cases: [&[(f64, f64)]; 3] = [&[(0.0, 0.0)], &[(30.0, 30.0), (30.0, 30.0)], &[(100.0, 0.0)]];
    for sparse in [false, true] {
        for waypoints in cases {
            let mut router = Router::new(RouterConfig {
                use_sparse_visibility_graph: sparse,
                ..RouterConfig::default()
            });
            router.add_shape(Shape::rectangle("wall", 40.0, -20.0, 60.0, 20.0)).expect("add");
            let routes = route_all(&mut router, &[free_edge("e", (0.0, 0.0), (100.0, 0.0), waypoints)]);
            let route = &routes[0];
            assert_eq!(route.points.first(), Some(&Point::new(0.0, 0.0)));
            assert_eq!(route.points.last(), Some(&Point::new(100.0, 0.0)));
            assert!(route.bends >= 2, "{waypoints:?}: {:?}", route.points);
            assert_rectilinear(route);
            assert_avoids_obstacles(&mut router, route);
        }
    }
}

#[test]
fn far_coordinates_are_rejected() {
    let mut router = Router::default();
    router.add_shape(Shape::rectangle("a", 0.0, 0.0, 10.0, 10.0)).expect("add");
    let far = free_edge("far", (-2e13, 5.0), (-3e13, 5.0), &[]);
    assert!(matches!(router.route_edge(&far), Err(RouterError::InvalidCoordinate(_))));
    let far_waypoint = free_edge("wp", (-5.0, 5.0), (15.0, 5.0), &[(5.0, 2e9)]);
    assert!(matches!(router.route_edge(&far_waypoint), Err(RouterError::InvalidCoordinate(_))));
    let far_port = Shape::rectangle("b", 20.0, 0.0, 30.0, 10.0).with_port("p", Point::new(25.0, 1e10));
    assert!(matches!(router.add_shape(far_port), Err(RouterError::InvalidCoordinate(_))));
}

fn polygon(id: &str, points: &[(f64, f64)]) -> Shape {
    Shape {
        boundary: points.iter().map(|(x, y)| Point::new(*x, *y)).collect(),
        ..Shape::rectangle(id, 0.0, 0.0, 1.0, 1.0)
    }
}

#[test]
fn sparse_splice_threads_through_collinear_pieces() {
    let shapes = vec![
        Shape::rectangle("s0", 102.0, 46.0, 120.0, 72.0).with_port("p", Point::new(111.0, 59.0)),
        polygon("s1", &[(31.0, 118.0), (51.0, 118.0), (44.0, 152.0)]),
        Shape::rectangle("s2", -7.0, 154.0, 33.0, 168.0),
        Shape::rectangle("s3", 144.0, 137.0, 172.0, 169.0).with_port("p", Point::new(158.0, 153.0)),
        polygon("s4", &[(190.0, 83.0), (202.0, 95.0), (190.0, 107.0), (178.0, 95.0)]),
        polygon("s5", &[(63.0, 28.0), (91.0, 28.0), (81.2, 64.0)]),
        polygon("s6", &[(188.0, 0.0), (200.0, 0.0), (195.8, 18.0)]),
        polygon("s7", &[(101.0, 36.0), (125.0, 36.0), (116.6, 64.0)]),
    ];
    for sparse in [true, false] {
        let mut router = Router::new(RouterConfig {
            use_sparse_visibility_graph: sparse,
            ..RouterConfig::default()
        });
        for shape in &shapes {
            router.add_shape(shape.clone()).expect("add");
        }
        let before = router.visibility_graph().expect("graph").clone();
        let edges = [
            EdgeRequest {
                id: "s0-s3".to_string(),
                source: port("s0", "p"),
                target: port("s3", "p"),
                waypoints: Vec::new(),
            },
            EdgeRequest {
                id: "s3-s0".to_string(),
                source: port("s3", "p"),
                target: port("s0", "p"),
                waypoints: Vec::new(),
            },
        ];
        let routes = route_all(&mut router, &edges);
        let tree = router.obstacle_tree().expect("tree");
        for route in &routes {
            assert!(route.bends > 0, "{}: {:?}", route.id, route.points);
            assert_rectilinear(route);
            // s7 overlaps the source shape, so only the separate shapes are checked.
            for obstacle in tree.obstacles().iter().filter(|o| ![0, 7].contains(&o.shape)) {
                for w in route.points.windows(2) {
                    assert!(!obstacle.input.crosses_interior(w[0], w[1]), "{}: {:?}", route.id, route.points);
                }
            }
        }
        assert_eq!(*router.visibility_graph().expect("graph"), before);
    }
}
