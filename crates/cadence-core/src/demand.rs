//! Seeded traffic demand and the route file describing it.
//!
//! Arrivals per step follow a Poisson distribution with rate
//! `car_count / step_count`. Each vehicle goes straight with probability
//! 0.75 and turns otherwise; the route is then picked uniformly among the
//! four straight or four turning routes. The same seed always yields the
//! same demand.

use std::io::{self, Write};

use cadence_types::Lane;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::info;

use crate::config::RunConfig;

/// Probability that a vehicle turns instead of going straight.
pub const TURN_PROBABILITY: f64 = 0.25;

/// Vehicle type line of the route file.
const VEHICLE_TYPE: &str = r#"<vType id="car" accel="0.8" decel="4.5" sigma="0.5" length="5" minGap="2.5" maxSpeed="25" guiShape="passenger"/>"#;

/// Speed in m/s at which vehicles enter the network.
const DEPART_SPEED: u32 = 10;

/// A path through the junction, named by entry direction and turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Route {
    /// Straight, entering on lane 1.
    Right,
    /// Straight, entering on lane 2.
    Down,
    /// Straight, entering on lane 3.
    Left,
    /// Straight, entering on lane 4.
    Up,
    /// Turn, entering on lane 1.
    RightUp,
    /// Turn, entering on lane 2.
    DownRight,
    /// Turn, entering on lane 3.
    LeftDown,
    /// Turn, entering on lane 4.
    UpLeft,
}

impl Route {
    /// Straight routes in selection order.
    pub const STRAIGHT: [Self; 4] = [Self::Right, Self::Down, Self::Left, Self::Up];

    /// Turning routes in selection order.
    pub const TURNING: [Self; 4] = [Self::RightUp, Self::DownRight, Self::LeftDown, Self::UpLeft];

    /// Route id used in the route file.
    pub const fn id(self) -> &'static str {
        match self {
            Self::Right => "right",
            Self::Down => "down",
            Self::Left => "left",
            Self::Up => "up",
            Self::RightUp => "right-up",
            Self::DownRight => "down-right",
            Self::LeftDown => "left-down",
            Self::UpLeft => "up-left",
        }
    }

    /// Space-separated edge list.
    pub const fn edges(self) -> &'static str {
        match self {
            Self::Right => "E0 E1",
            Self::Down => "E2 E3",
            Self::Left => "-E1 -E0",
            Self::Up => "-E3 -E2",
            Self::RightUp => "E0 -E2",
            Self::DownRight => "E2 E1",
            Self::LeftDown => "-E1 E3",
            Self::UpLeft => "-E3 -E0",
        }
    }

    /// The monitored lane the route enters the junction on.
    pub const fn entry_lane(self) -> Lane {
        match self {
            Self::Right | Self::RightUp => Lane::Lane1,
            Self::Down | Self::DownRight => Lane::Lane2,
            Self::Left | Self::LeftDown => Lane::Lane3,
            Self::Up | Self::UpLeft => Lane::Lane4,
        }
    }

    /// Whether the route crosses the junction without turning.
    pub const fn is_straight(self) -> bool {
        matches!(self, Self::Right | Self::Down | Self::Left | Self::Up)
    }
}

impl core::fmt::Display for Route {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.id())
    }
}

/// One scheduled vehicle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Departure {
    /// Sequence number, unique within a demand.
    pub vehicle: u32,
    /// The vehicle's route.
    pub route: Route,
    /// Step at which the vehicle enters the network.
    pub step: u64,
}

impl Departure {
    /// Vehicle id used in the route file, e.g. `left-down_17`.
    pub fn vehicle_id(&self) -> String {
        format!("{}_{}", self.route.id(), self.vehicle)
    }
}

/// A generated demand: departures sorted by step.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Demand {
    departures: Vec<Departure>,
}

impl Demand {
    /// Wrap a departure list, sorting it by step.
    pub fn new(mut departures: Vec<Departure>) -> Self {
        departures.sort_by_key(|d| (d.step, d.vehicle));
        Self { departures }
    }

    /// Generate demand from the run configuration.
    pub fn generate(config: &RunConfig) -> Self {
        Self::generate_with(config.car_count, config.step_count, config.random_seed)
    }

    /// Generate `step_count` steps of demand averaging `car_count` vehicles.
    pub fn generate_with(car_count: u32, step_count: u32, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let rate = if step_count == 0 {
            0.0
        } else {
            f64::from(car_count) / f64::from(step_count)
        };

        let mut departures = Vec::new();
        let mut vehicle: u32 = 0;
        for step in 0..u64::from(step_count) {
            for _ in 0..poisson(&mut rng, rate) {
                let routes = if rng.random::<f64>() > TURN_PROBABILITY {
                    &Route::STRAIGHT
                } else {
                    &Route::TURNING
                };
                let pick = rng.random_range(0..routes.len());
                if let Some(&route) = routes.get(pick) {
                    departures.push(Departure {
                        vehicle,
                        route,
                        step,
                    });
                    vehicle = vehicle.saturating_add(1);
                }
            }
        }

        info!(
            vehicles = departures.len(),
            steps = step_count,
            rate,
            seed,
            "Demand generated"
        );
        Self { departures }
    }

    /// All departures in step order.
    pub fn departures(&self) -> &[Departure] {
        &self.departures
    }

    /// Number of vehicles.
    pub fn len(&self) -> usize {
        self.departures.len()
    }

    /// Whether no vehicle is scheduled.
    pub fn is_empty(&self) -> bool {
        self.departures.is_empty()
    }

    /// Number of vehicles entering on `lane`.
    pub fn count_for(&self, lane: Lane) -> usize {
        self.departures
            .iter()
            .filter(|d| d.route.entry_lane() == lane)
            .count()
    }

    /// Write the demand as a `<routes>` document: the vehicle type, every
    /// route definition, then one `<vehicle>` element per departure.
    ///
    /// # Errors
    ///
    /// Propagates write failures.
    pub fn write_routes<W: Write>(&self, out: &mut W) -> io::Result<()> {
        writeln!(out, "<routes>")?;
        writeln!(out, "    {VEHICLE_TYPE}")?;
        for route in Route::STRAIGHT.into_iter().chain(Route::TURNING) {
            writeln!(
                out,
                r#"    <route id="{}" edges="{}"/>"#,
                route.id(),
                route.edges()
            )?;
        }
        for departure in &self.departures {
            writeln!(
                out,
                r#"    <vehicle id="{}" type="car" route="{}" depart="{}" departSpeed="{DEPART_SPEED}" />"#,
                departure.vehicle_id(),
                departure.route.id(),
                departure.step
            )?;
        }
        writeln!(out, "</routes>")
    }
}

/// Largest rate drawn in one multiplication run. `e^-rate` underflows to
/// zero a little above 745, so larger rates are split into chunks.
const POISSON_CHUNK_RATE: f64 = 500.0;

/// Sample a Poisson-distributed count.
///
/// Rates above [`POISSON_CHUNK_RATE`] are drawn as a sum of smaller Poisson
/// draws, which is Poisson with the summed rate.
fn poisson<R: Rng>(rng: &mut R, rate: f64) -> u32 {
    if !rate.is_finite() || rate <= 0.0 {
        return 0;
    }
    let mut remaining = rate;
    let mut count: u32 = 0;
    loop {
        let chunk = remaining.min(POISSON_CHUNK_RATE);
        count = count.saturating_add(poisson_small(rng, chunk));
        remaining -= chunk;
        if remaining <= 0.0 {
            return count;
        }
    }
}

/// Multiply uniforms until the product drops below `e^-rate`.
fn poisson_small<R: Rng>(rng: &mut R, rate: f64) -> u32 {
    let threshold = (-rate).exp();
    let mut count: u32 = 0;
    let mut product: f64 = rng.random();
    loop {
        if product <= threshold {
            return count;
        }
        count = count.saturating_add(1);
        product *= rng.random::<f64>();
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::indexing_slicing,
    clippy::cast_precision_loss
)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_demand() {
        let a = Demand::generate_with(300, 360, 42);
        let b = Demand::generate_with(300, 360, 42);
        assert_eq!(a, b);
        let c = Demand::generate_with(300, 360, 7);
        assert_ne!(a, c);
    }

    #[test]
    fn volume_tracks_the_configured_rate() {
        let demand = Demand::generate(&RunConfig::default());
        // 3000 expected; a Poisson total has a standard deviation near 55.
        let vehicles = demand.len();
        assert!((2700..=3300).contains(&vehicles), "got {vehicles}");
        assert!(demand.departures().iter().all(|d| d.step < 3600));
    }

    #[test]
    fn most_vehicles_go_straight() {
        let demand = Demand::generate_with(3000, 3600, 42);
        let straight = demand
            .departures()
            .iter()
            .filter(|d| d.route.is_straight())
            .count();
        let share = straight as f64 / demand.len() as f64;
        assert!((0.70..=0.80).contains(&share), "straight share {share}");
        for lane in Lane::ALL {
            let lane_share = demand.count_for(lane) as f64 / demand.len() as f64;
            assert!((0.20..=0.30).contains(&lane_share), "{lane} share {lane_share}");
        }
    }

    #[test]
    fn vehicle_numbers_are_sequential_in_step_order() {
        let demand = Demand::generate_with(500, 100, 3);
        for (index, departure) in demand.departures().iter().enumerate() {
            assert_eq!(departure.vehicle, u32::try_from(index).unwrap());
        }
        assert!(demand.departures().windows(2).all(|w| w[0].step <= w[1].step));
    }

    #[test]
    fn rates_past_exp_underflow_keep_their_volume() {
        // 10_000 per step; a single multiplication run would stop near 745.
        let demand = Demand::generate_with(200_000, 20, 11);
        let vehicles = demand.len();
        assert!((196_000..=204_000).contains(&vehicles), "got {vehicles}");
    }

    #[test]
    fn chunked_draw_mean_matches_rate() {
        let mut rng = StdRng::seed_from_u64(5);
        let draws = 200;
        let total: u64 = (0..draws)
            .map(|_| u64::from(poisson(&mut rng, 2000.0)))
            .sum();
        let mean = total as f64 / f64::from(draws);
        // Standard error of the mean is about 3.2.
        assert!((1970.0..=2030.0).contains(&mean), "mean {mean}");
    }

    #[test]
    fn zero_rate_yields_nothing() {
        assert!(Demand::generate_with(0, 3600, 42).is_empty());
        assert!(Demand::generate_with(100, 0, 42).is_empty());
    }

    #[test]
    fn route_file_lists_types_routes_and_vehicles() {
        let demand = Demand::new(vec![
            Departure {
                vehicle: 1,
                route: Route::LeftDown,
                step: 4,
            },
            Departure {
                vehicle: 0,
                route: Route::Right,
                step: 0,
            },
        ]);
        let mut out = Vec::new();
        demand.write_routes(&mut out).unwrap();
        let xml = String::from_utf8(out).unwrap();

        assert!(xml.starts_with("<routes>\n"));
        assert!(xml.trim_end().ends_with("</routes>"));
        assert!(xml.contains(r#"<vType id="car" accel="0.8""#));
        assert!(xml.contains(r#"<route id="up-left" edges="-E3 -E0"/>"#));
        assert_eq!(xml.matches("<route ").count(), 8);
        let right = xml
            .find(r#"<vehicle id="right_0" type="car" route="right" depart="0" departSpeed="10" />"#)
            .unwrap();
        let left_down = xml.find(r#"<vehicle id="left-down_1""#).unwrap();
        assert!(right < left_down);
    }

    #[test]
    fn routes_enter_on_their_lane() {
        assert_eq!(Route::UpLeft.entry_lane(), Lane::Lane4);
        assert_eq!(Route::Down.entry_lane(), Lane::Lane2);
        assert!(Route::TURNING.iter().all(|r| !r.is_straight()));
        assert_eq!(Route::RightUp.to_string(), "right-up");
    }
}
