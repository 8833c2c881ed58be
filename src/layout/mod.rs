//! Force-directed placement of graph nodes on a fixed canvas.
//!
//! Nodes start scattered at random and are relaxed for a fixed number of
//! ticks under four forces: springs along edges, pairwise repulsion, a pull
//! towards the canvas center and a hard minimum separation. A cooling factor
//! shrinks every force over the run. Positions are cosmetic, so two runs over
//! the same graph are not expected to agree.

use rand::Rng;

use crate::graph::Point;

pub const DEFAULT_WIDTH: f32 = 1000.0;
pub const DEFAULT_HEIGHT: f32 = 800.0;
pub const DEFAULT_ITERATIONS: usize = 300;

const ALPHA_MIN: f32 = 0.001;
const LINK_STRENGTH: f32 = 0.7;
const MIN_DISTANCE_SQ: f32 = 1.0;
const COINCIDENT_EPSILON: f32 = 1e-4;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutConfig {
    pub width: f32,
    pub height: f32,
    pub iterations: usize,
    pub link_distance: f32,
    pub repulsion_strength: f32,
    pub center_strength: f32,
    pub collision_radius: f32,
    pub velocity_decay: f32,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            iterations: DEFAULT_ITERATIONS,
            link_distance: 120.0,
            repulsion_strength: 300.0,
            center_strength: 0.05,
            collision_radius: 30.0,
            velocity_decay: 0.4,
        }
    }
}

/// Edge between two node indices; `weight` in [0, 1] scales the spring.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutLink {
    pub source: usize,
    pub target: usize,
    pub weight: f32,
}

// Scratch state for one layout call.
#[derive(Debug, Clone, Copy, Default)]
struct Body {
    x: f32,
    y: f32,
    vx: f32,
    vy: f32,
}

#[derive(Debug, Clone, Default)]
pub struct LayoutEngine {
    config: LayoutConfig,
}

impl LayoutEngine {
    pub fn new(config: LayoutConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &LayoutConfig {
        &self.config
    }

    pub fn layout(&self, node_count: usize, links: &[LayoutLink]) -> Vec<Point> {
        self.layout_with_rng(node_count, links, &mut rand::thread_rng())
    }

    pub fn layout_with_rng<R: Rng + ?Sized>(
        &self,
        node_count: usize,
        links: &[LayoutLink],
        rng: &mut R,
    ) -> Vec<Point> {
        if node_count == 0 {
            return Vec::new();
        }

        let width = self.config.width.max(1.0);
        let height = self.config.height.max(1.0);
        let mut bodies = (0..node_count)
            .map(|_| Body {
                x: rng.gen_range(0.0..width),
                y: rng.gen_range(0.0..height),
                ..Body::default()
            })
            .collect::<Vec<_>>();

        self.relax(&mut bodies, links);

        bodies
            .iter()
            .map(|body| Point {
                x: body.x,
                y: body.y,
            })
            .collect()
    }

    fn relax(&self, bodies: &mut [Body], links: &[LayoutLink]) {
        let iterations = self.config.iterations.max(1);
        let alpha_decay = 1.0 - ALPHA_MIN.powf(1.0 / iterations as f32);
        let retain = (1.0 - self.config.velocity_decay).clamp(0.0, 1.0);
        let mut alpha = 1.0_f32;

        for _ in 0..iterations {
            alpha -= alpha * alpha_decay;

            self.apply_links(bodies, links, alpha);
            self.apply_repulsion(bodies, alpha);
            self.apply_centering(bodies, alpha);

            for body in bodies.iter_mut() {
                body.vx *= retain;
                body.vy *= retain;
                body.x += body.vx;
                body.y += body.vy;
            }

            self.resolve_collisions(bodies);
        }
    }

    fn apply_links(&self, bodies: &mut [Body], links: &[LayoutLink], alpha: f32) {
        let count = bodies.len();
        for link in links {
            if link.source >= count || link.target >= count || link.source == link.target {
                continue;
            }
            let source = bodies[link.source];
            let target = bodies[link.target];
            let mut dx = (target.x + target.vx) - (source.x + source.vx);
            let mut dy = (target.y + target.vy) - (source.y + source.vy);
            if dx.abs() < COINCIDENT_EPSILON && dy.abs() < COINCIDENT_EPSILON {
                (dx, dy) = spread_direction(link.source, link.target);
                dx *= COINCIDENT_EPSILON;
                dy *= COINCIDENT_EPSILON;
            }
            let distance = (dx * dx + dy * dy).sqrt();
            let strength = LINK_STRENGTH * link.weight.clamp(0.0, 1.0);
            let pull = (distance - self.config.link_distance) / distance * alpha * strength;
            let (fx, fy) = (dx * pull * 0.5, dy * pull * 0.5);

            bodies[link.target].vx -= fx;
            bodies[link.target].vy -= fy;
            bodies[link.source].vx += fx;
            bodies[link.source].vy += fy;
        }
    }

    fn apply_repulsion(&self, bodies: &mut [Body], alpha: f32) {
        let strength = self.config.repulsion_strength * alpha;
        for i in 0..bodies.len() {
            for j in (i + 1)..bodies.len() {
                let mut dx = bodies[j].x - bodies[i].x;
                let mut dy = bodies[j].y - bodies[i].y;
                let mut distance_sq = dx * dx + dy * dy;
                if distance_sq < COINCIDENT_EPSILON {
                    (dx, dy) = spread_direction(i, j);
                    distance_sq = 1.0;
                }
                let push = strength / distance_sq.max(MIN_DISTANCE_SQ);

                bodies[i].vx -= dx * push;
                bodies[i].vy -= dy * push;
                bodies[j].vx += dx * push;
                bodies[j].vy += dy * push;
            }
        }
    }

    fn apply_centering(&self, bodies: &mut [Body], alpha: f32) {
        let cx = self.config.width / 2.0;
        let cy = self.config.height / 2.0;
        let pull = self.config.center_strength * alpha;
        for body in bodies.iter_mut() {
            body.vx += (cx - body.x) * pull;
            body.vy += (cy - body.y) * pull;
        }
    }

    fn resolve_collisions(&self, bodies: &mut [Body]) {
        let min_distance = self.config.collision_radius * 2.0;
        if min_distance <= 0.0 {
            return;
        }
        for i in 0..bodies.len() {
            for j in (i + 1)..bodies.len() {
                let mut dx = bodies[j].x - bodies[i].x;
                let mut dy = bodies[j].y - bodies[i].y;
                let mut distance = (dx * dx + dy * dy).sqrt();
                if distance >= min_distance {
                    continue;
                }
                if distance < COINCIDENT_EPSILON {
                    (dx, dy) = spread_direction(i, j);
                    distance = 1.0;
                }
                let overlap = (min_distance - distance) / distance * 0.5;

                bodies[i].x -= dx * overlap;
                bodies[i].y -= dy * overlap;
                bodies[j].x += dx * overlap;
                bodies[j].y += dy * overlap;
            }
        }
    }
}

// Unit vector for separating nodes that sit on top of each other.
fn spread_direction(i: usize, j: usize) -> (f32, f32) {
    let angle = ((i as f32) * 0.618_034 + (j as f32) * 0.414_214) * std::f32::consts::TAU;
    (angle.cos(), angle.sin())
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;

    fn distance(a: Body, b: Body) -> f32 {
        ((a.x - b.x).powi(2) + (a.y - b.y).powi(2)).sqrt()
    }

    #[test]
    fn empty_graph_skips_simulation() {
        let engine = LayoutEngine::default();
        assert!(engine.layout(0, &[]).is_empty());
    }

    #[test]
    fn lone_node_settles_near_center() {
        let engine = LayoutEngine::default();
        let mut rng = StdRng::seed_from_u64(7);
        let points = engine.layout_with_rng(1, &[], &mut rng);

        assert_eq!(points.len(), 1);
        assert!((points[0].x - DEFAULT_WIDTH / 2.0).abs() < 50.0);
        assert!((points[0].y - DEFAULT_HEIGHT / 2.0).abs() < 50.0);
    }

    #[test]
    fn same_seed_gives_same_positions() {
        let engine = LayoutEngine::default();
        let links = [
            LayoutLink {
                source: 0,
                target: 1,
                weight: 1.0,
            },
            LayoutLink {
                source: 1,
                target: 2,
                weight: 0.6,
            },
        ];
        let first = engine.layout_with_rng(4, &links, &mut StdRng::seed_from_u64(42));
        let second = engine.layout_with_rng(4, &links, &mut StdRng::seed_from_u64(42));
        assert_eq!(first, second);
        assert!(
            first
                .iter()
                .all(|point| point.x.is_finite() && point.y.is_finite())
        );
    }

    #[test]
    fn coincident_nodes_are_pushed_apart() {
        let engine = LayoutEngine::default();
        let mut bodies = vec![
            Body {
                x: 500.0,
                y: 400.0,
                ..Body::default()
            };
            4
        ];
        let links = [LayoutLink {
            source: 0,
            target: 1,
            weight: 1.0,
        }];

        engine.relax(&mut bodies, &links);

        for body in &bodies {
            assert!(body.x.is_finite() && body.y.is_finite());
        }
        for i in 0..bodies.len() {
            for j in (i + 1)..bodies.len() {
                assert!(
                    distance(bodies[i], bodies[j]) > engine.config().collision_radius,
                    "bodies {i} and {j} overlap"
                );
            }
        }
    }

    #[test]
    fn out_of_range_and_self_links_are_ignored() {
        let engine = LayoutEngine::default();
        let links = [
            LayoutLink {
                source: 0,
                target: 9,
                weight: 1.0,
            },
            LayoutLink {
                source: 1,
                target: 1,
                weight: 1.0,
            },
        ];
        let points = engine.layout_with_rng(2, &links, &mut StdRng::seed_from_u64(3));
        assert_eq!(points.len(), 2);
        assert!(points.iter().all(|point| point.x.is_finite()));
    }
}
