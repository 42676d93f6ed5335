use std::marker::PhantomData;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use caravan_core::directions::DirectionsProvider;
use caravan_core::geopoint::GeoPoint;
use caravan_core::kinematics::simulate_hop;
use caravan_core::shipment::{Shipment, ShipmentId, ShipmentStatus, VehicleId};
use caravan_core::store::ShipmentStore;
use fxhash::FxHashMap;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use thiserror::Error;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, warn};

use crate::resolver::{RouteError, RouteResolver};
use crate::state_machine::{ShipmentStateMachine, TransitionError};

#[derive(Debug, Error)]
pub enum SimError {
    #[error("a simulation run is still in progress")]
    RunInProgress,
}

#[derive(Debug, Error)]
enum ShipmentRunError {
    #[error(transparent)]
    Route(#[from] RouteError),

    #[error(transparent)]
    Transition(#[from] TransitionError),
}

/// One animated hop. `offset_hours` is the run's accumulated animation
/// clock, not wall time; the presentation layer times rendering itself.
#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub shipment: ShipmentId,
    pub vehicle: VehicleId,
    pub position: GeoPoint,
    pub speed_kmh: f64,
    pub hop_distance_km: f64,
    pub total_distance_km: f64,
    pub total_time_hours: f64,
    pub offset_hours: f64,
}

#[derive(Debug, Clone)]
pub enum SimEvent {
    /// Resolved route geometry for a segment, for the presentation layer
    /// to draw. Emitted before the segment's progress events, and for
    /// already-Completed segments whose route is replayed display-only.
    RouteResolved {
        shipment: ShipmentId,
        vehicle: VehicleId,
        path: Vec<GeoPoint>,
    },
    Progress(ProgressEvent),
    ShipmentCompleted {
        shipment: ShipmentId,
        total_distance_km: f64,
        total_time_hours: f64,
    },
    /// Partial-failure signal: this shipment's sequence stalled and the
    /// run will not reach `RunCompleted`.
    ShipmentFailed {
        shipment: ShipmentId,
        error: String,
        last_position: Option<GeoPoint>,
    },
    RunCompleted,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SimulatorParams {
    /// Seed for the per-vehicle speed generators; `None` draws from the OS.
    pub rng_seed: Option<u64>,
}

/// Drives concurrent per-vehicle shipment sequences: resolves routes,
/// derives hop kinematics, persists status transitions, and streams
/// progress events. One cooperative task per vehicle; the shared pending
/// counter is decremented once per finished shipment and the task that
/// brings it to zero emits `RunCompleted` exactly once.
pub struct TripSimulator<P, S, R = SmallRng> {
    resolver: Arc<RouteResolver<P>>,
    state_machine: Arc<ShipmentStateMachine<S>>,
    pending: Arc<AtomicUsize>,
    params: SimulatorParams,
    _rng: PhantomData<fn() -> R>,
}

impl<P, S, R> TripSimulator<P, S, R>
where
    P: DirectionsProvider + 'static,
    S: ShipmentStore + 'static,
    R: Rng + SeedableRng + Send + 'static,
{
    pub fn new(
        resolver: Arc<RouteResolver<P>>,
        state_machine: Arc<ShipmentStateMachine<S>>,
        params: SimulatorParams,
    ) -> Self {
        Self {
            resolver,
            state_machine,
            pending: Arc::new(AtomicUsize::new(0)),
            params,
            _rng: PhantomData,
        }
    }

    /// Shipments whose simulation has not yet reached Completed in the
    /// active run.
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    pub fn is_running(&self) -> bool {
        self.pending() > 0
    }

    /// Begins a run and returns its event stream. Refuses while a previous
    /// run still has pending shipments.
    pub fn start_run(
        &self,
        shipments: Vec<Shipment>,
    ) -> Result<UnboundedReceiver<SimEvent>, SimError> {
        if self
            .pending
            .compare_exchange(0, shipments.len(), Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(SimError::RunInProgress);
        }

        let (events, receiver) = mpsc::unbounded_channel();
        if shipments.is_empty() {
            let _ = events.send(SimEvent::RunCompleted);
            return Ok(receiver);
        }

        let by_vehicle = group_by_vehicle(shipments);
        debug!(
            "starting run: {} shipments across {} vehicles",
            self.pending(),
            by_vehicle.len()
        );

        for (index, (vehicle, sequence)) in by_vehicle.into_iter().enumerate() {
            let run = VehicleRun {
                vehicle,
                resolver: Arc::clone(&self.resolver),
                state_machine: Arc::clone(&self.state_machine),
                pending: Arc::clone(&self.pending),
                events: events.clone(),
            };
            let rng = match self.params.rng_seed {
                Some(seed) => R::seed_from_u64(seed.wrapping_add(index as u64)),
                None => R::from_os_rng(),
            };

            tokio::spawn(run.run(sequence, rng));
        }

        Ok(receiver)
    }
}

/// Groups shipments by vehicle, preserving encounter order both across
/// vehicles and within each vehicle's sequence.
fn group_by_vehicle(shipments: Vec<Shipment>) -> Vec<(VehicleId, Vec<Shipment>)> {
    let mut grouped: Vec<(VehicleId, Vec<Shipment>)> = Vec::new();
    let mut index: FxHashMap<VehicleId, usize> = FxHashMap::default();

    for shipment in shipments {
        match index.get(&shipment.vehicle) {
            Some(&slot) => grouped[slot].1.push(shipment),
            None => {
                index.insert(shipment.vehicle, grouped.len());
                grouped.push((shipment.vehicle, vec![shipment]));
            }
        }
    }

    grouped
}

/// Ephemeral per-vehicle progress for one run; discarded when the run
/// ends. Only the final shipment totals outlive it, via the store.
#[derive(Debug, Default)]
struct VehicleSimState {
    segment_index: usize,
    position: Option<GeoPoint>,
    offset_hours: f64,
}

impl VehicleSimState {
    fn advance(&mut self, position: GeoPoint) {
        self.segment_index += 1;
        self.position = Some(position);
    }
}

struct VehicleRun<P, S> {
    vehicle: VehicleId,
    resolver: Arc<RouteResolver<P>>,
    state_machine: Arc<ShipmentStateMachine<S>>,
    pending: Arc<AtomicUsize>,
    events: UnboundedSender<SimEvent>,
}

impl<P: DirectionsProvider, S: ShipmentStore> VehicleRun<P, S> {
    async fn run<R: Rng + Send>(self, sequence: Vec<Shipment>, mut rng: R) {
        let mut state = VehicleSimState::default();

        for mut shipment in sequence {
            if shipment.status == ShipmentStatus::Completed {
                // Route fetched for display only; no kinematics and no
                // persistence write. A resolver error here loses nothing
                // persisted, so the sequence keeps going.
                match self.resolver.resolve(shipment.origin, shipment.dest).await {
                    Ok(path) => {
                        let _ = self.events.send(SimEvent::RouteResolved {
                            shipment: shipment.id,
                            vehicle: self.vehicle,
                            path,
                        });
                    }
                    Err(err) => warn!(
                        "display route for completed shipment {:?} unavailable: {err}",
                        shipment.id
                    ),
                }
                state.advance(shipment.dest);
                self.finish_one();
                continue;
            }

            match self.simulate(&mut shipment, &mut state, &mut rng).await {
                Ok(()) => {
                    let _ = self.events.send(SimEvent::ShipmentCompleted {
                        shipment: shipment.id,
                        total_distance_km: shipment.total_distance_km,
                        total_time_hours: shipment.total_time_hours,
                    });
                    state.advance(shipment.dest);
                    self.finish_one();
                }
                Err(err) => {
                    // Stalled: counter stays put so the run never reports
                    // completion, and sibling vehicles are unaffected.
                    warn!("shipment {:?} stalled: {err}", shipment.id);
                    let _ = self.events.send(SimEvent::ShipmentFailed {
                        shipment: shipment.id,
                        error: err.to_string(),
                        last_position: state.position,
                    });
                    return;
                }
            }
        }

        debug!(
            "vehicle {:?} finished {} segments",
            self.vehicle, state.segment_index
        );
    }

    async fn simulate<R: Rng>(
        &self,
        shipment: &mut Shipment,
        state: &mut VehicleSimState,
        rng: &mut R,
    ) -> Result<(), ShipmentRunError> {
        // Persist-before-animate: the Moving status is durable before the
        // first progress event goes out.
        if shipment.status == ShipmentStatus::Pending {
            self.state_machine
                .transition(shipment, ShipmentStatus::Moving, 0.0, 0.0)
                .await?;
        }

        let path = self
            .resolver
            .resolve(shipment.origin, shipment.dest)
            .await?;

        let _ = self.events.send(SimEvent::RouteResolved {
            shipment: shipment.id,
            vehicle: self.vehicle,
            path: path.clone(),
        });

        let mut distance_km = 0.0;
        let mut time_hours = 0.0;

        for window in path.windows(2) {
            let hop = simulate_hop(&window[0], &window[1], rng);
            distance_km += hop.distance_km;
            time_hours += hop.time_hours;
            state.offset_hours += hop.time_hours;
            state.position = Some(window[1]);

            let _ = self.events.send(SimEvent::Progress(ProgressEvent {
                shipment: shipment.id,
                vehicle: self.vehicle,
                position: window[1],
                speed_kmh: hop.speed_kmh,
                hop_distance_km: hop.distance_km,
                total_distance_km: shipment.total_distance_km + distance_km,
                total_time_hours: shipment.total_time_hours + time_hours,
                offset_hours: state.offset_hours,
            }));
        }

        self.state_machine
            .transition(shipment, ShipmentStatus::Completed, distance_km, time_hours)
            .await?;
        Ok(())
    }

    fn finish_one(&self) {
        // Decrement and zero-check in one atomic step; only one task can
        // observe the final decrement.
        if self.pending.fetch_sub(1, Ordering::SeqCst) == 1 {
            debug!("all shipments completed");
            let _ = self.events.send(SimEvent::RunCompleted);
        }
    }
}
