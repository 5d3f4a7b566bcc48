//! Object factory: builds a tracked object from a one-time initialization
//! description.
//!
//! The description carries a type tag and the geometry for that type:
//! - `rope`: ordered nodes and a capsule radius
//! - `towel_corners`: four corners; the grid resolution follows from the
//!   edge lengths and the configured node distance
//! - `box`: center, full extents and a rotation about +Z
//!
//! Construction either yields a complete object or fails; there is no
//! partially defined result.

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::config::{FactoryConfig, PhysicsConfig};
use crate::error::TrackingError;
use crate::geometry::SE3;
use crate::simulation::{BoxBody, CapsuleRope, ClothSheet};
use crate::tracking::{ObservedPointSet, TrackedObject};

/// Initialization description as returned by the initialization service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectInitMsg {
    /// "rope", "towel_corners" or "box".
    #[serde(rename = "type")]
    pub object_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rope: Option<RopeInit>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub towel_corners: Option<TowelCornersInit>,
    #[serde(default, rename = "box", skip_serializing_if = "Option::is_none")]
    pub box_init: Option<BoxInit>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RopeInit {
    pub nodes: Vec<[f64; 3]>,
    pub radius: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TowelCornersInit {
    /// Polygon corners; `0 → 1` spans x, `0 → 3` spans y.
    pub corners: Vec<[f64; 3]>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoxInit {
    pub center: [f64; 3],
    /// Full edge lengths.
    pub extents: [f64; 3],
    /// Rotation about +Z (radians).
    pub angle: f64,
}

impl ObjectInitMsg {
    pub fn rope(nodes: &[Vector3<f64>], radius: f64) -> Self {
        Self {
            object_type: "rope".to_string(),
            rope: Some(RopeInit {
                nodes: nodes.iter().map(|p| [p.x, p.y, p.z]).collect(),
                radius,
            }),
            towel_corners: None,
            box_init: None,
        }
    }

    pub fn towel(corners: &[Vector3<f64>; 4]) -> Self {
        Self {
            object_type: "towel_corners".to_string(),
            rope: None,
            towel_corners: Some(TowelCornersInit {
                corners: corners.iter().map(|p| [p.x, p.y, p.z]).collect(),
            }),
            box_init: None,
        }
    }

    pub fn cuboid(center: Vector3<f64>, extents: Vector3<f64>, angle: f64) -> Self {
        Self {
            object_type: "box".to_string(),
            rope: None,
            towel_corners: None,
            box_init: Some(BoxInit {
                center: [center.x, center.y, center.z],
                extents: [extents.x, extents.y, extents.z],
                angle,
            }),
        }
    }
}

/// Request/response collaborator that proposes an initial object for a cloud.
pub trait InitializationService {
    fn request(&mut self, cloud: &ObservedPointSet) -> Result<ObjectInitMsg, TrackingError>;
}

/// Build the tracked object described by `init`.
pub fn to_tracked_object(
    init: &ObjectInitMsg,
    factory: &FactoryConfig,
    physics: &PhysicsConfig,
) -> Result<TrackedObject, TrackingError> {
    factory.validate()?;
    physics.validate()?;
    match init.object_type.as_str() {
        "rope" => {
            let rope = init
                .rope
                .as_ref()
                .ok_or_else(|| TrackingError::malformed_init("rope type without rope geometry"))?;
            build_rope(rope, factory, physics)
        }
        "towel_corners" => {
            let towel = init.towel_corners.as_ref().ok_or_else(|| {
                TrackingError::malformed_init("towel_corners type without corners")
            })?;
            build_towel(towel, factory, physics)
        }
        "box" => {
            let cuboid = init
                .box_init
                .as_ref()
                .ok_or_else(|| TrackingError::malformed_init("box type without box geometry"))?;
            build_box(cuboid, factory, physics)
        }
        other => Err(TrackingError::UnrecognizedInitType(other.to_string())),
    }
}

/// Ask `service` for a description of `cloud` and build it. Fails fast when
/// the service fails or the description is unusable.
pub fn create_object_from_service<S: InitializationService + ?Sized>(
    service: &mut S,
    cloud: &ObservedPointSet,
    factory: &FactoryConfig,
    physics: &PhysicsConfig,
) -> Result<TrackedObject, TrackingError> {
    let init = service.request(cloud).map_err(|e| {
        error!("Initialization failed: {}", e);
        e
    })?;
    to_tracked_object(&init, factory, physics)
}

/// Nodes per edge for a towel side of length `edge`.
pub fn towel_resolution(edge: f64, node_distance: f64) -> usize {
    ((edge / node_distance).round() as usize)
        .saturating_add(1)
        .max(2)
}

fn to_vector(p: &[f64; 3], what: &str) -> Result<Vector3<f64>, TrackingError> {
    let v = Vector3::new(p[0], p[1], p[2]);
    if v.iter().all(|c| c.is_finite()) {
        Ok(v)
    } else {
        Err(TrackingError::malformed_init(format!("{} is not finite", what)))
    }
}

fn build_rope(
    rope: &RopeInit,
    factory: &FactoryConfig,
    physics: &PhysicsConfig,
) -> Result<TrackedObject, TrackingError> {
    if rope.nodes.len() < 2 {
        return Err(TrackingError::malformed_init(format!(
            "rope needs at least 2 nodes, got {}",
            rope.nodes.len()
        )));
    }
    if !(rope.radius.is_finite() && rope.radius > 0.0) {
        return Err(TrackingError::malformed_init(format!(
            "rope radius must be positive, got {}",
            rope.radius
        )));
    }
    let nodes = rope
        .nodes
        .iter()
        .map(|p| to_vector(p, "rope node"))
        .collect::<Result<Vec<_>, _>>()?;

    let sim = CapsuleRope::new(&nodes, rope.radius, factory.rope_density, physics.clone());
    info!(
        "Created rope: {} nodes, radius {:.4}, length {:.3} m, mass {:.4} kg",
        sim.num_nodes(),
        sim.radius(),
        sim.length(),
        sim.total_mass()
    );
    Ok(TrackedObject::from(sim))
}

fn build_towel(
    towel: &TowelCornersInit,
    factory: &FactoryConfig,
    physics: &PhysicsConfig,
) -> Result<TrackedObject, TrackingError> {
    if towel.corners.len() != 4 {
        return Err(TrackingError::malformed_init(format!(
            "towel needs 4 corners, got {}",
            towel.corners.len()
        )));
    }
    let mut corners = [Vector3::zeros(); 4];
    for (dst, src) in corners.iter_mut().zip(&towel.corners) {
        *dst = to_vector(src, "towel corner")?;
    }

    let sx = (corners[0] - corners[1]).norm();
    let sy = (corners[0] - corners[3]).norm();
    if sx <= 0.0 || sy <= 0.0 {
        return Err(TrackingError::malformed_init("towel corners are degenerate"));
    }
    let resolution_x = towel_resolution(sx, factory.node_distance);
    let resolution_y = towel_resolution(sy, factory.node_distance);
    let mass = factory.surface_density * sx * sy;

    info!("Created towel with following properties:");
    info!("Surface density (mass per area): {}", factory.surface_density);
    info!("Mass: {}", mass);
    info!("Dimensions and area: {:.3} x {:.3} = {:.4}", sx, sy, sx * sy);
    info!("Node distance: {}", factory.node_distance);
    info!("Resolution: {} {}", resolution_x, resolution_y);

    let sim = ClothSheet::new(
        &corners,
        resolution_x,
        resolution_y,
        mass,
        factory.cloth_margin,
        physics.clone(),
    );
    Ok(TrackedObject::from(sim))
}

fn build_box(
    cuboid: &BoxInit,
    factory: &FactoryConfig,
    physics: &PhysicsConfig,
) -> Result<TrackedObject, TrackingError> {
    let center = to_vector(&cuboid.center, "box center")?;
    let extents = to_vector(&cuboid.extents, "box extents")?;
    if extents.iter().any(|&e| e <= 0.0) {
        return Err(TrackingError::malformed_init(format!(
            "box extents must be positive, got {:?}",
            cuboid.extents
        )));
    }
    if !cuboid.angle.is_finite() {
        return Err(TrackingError::malformed_init(format!(
            "box angle must be finite, got {}",
            cuboid.angle
        )));
    }

    let pose = SE3::from_yaw(cuboid.angle, center);
    let sim = BoxBody::new(
        factory.box_mass,
        extents * 0.5,
        pose,
        factory.box_samples_per_edge,
        physics.clone(),
    );
    info!(
        "Created box: extents {:?}, angle {:.3}, mass {} kg, {} points",
        cuboid.extents,
        cuboid.angle,
        sim.mass(),
        sim.num_points()
    );
    Ok(TrackedObject::from(sim))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracking::ObjectType;
    use approx::assert_relative_eq;

    fn unit_corners() -> [Vector3<f64>; 4] {
        [
            Vector3::new(0.0, 0.0, 0.0),
            Vector3::new(1.0, 0.0, 0.0),
            Vector3::new(1.0, 1.0, 0.0),
            Vector3::new(0.0, 1.0, 0.0),
        ]
    }

    fn build(init: &ObjectInitMsg) -> Result<TrackedObject, TrackingError> {
        to_tracked_object(init, &FactoryConfig::default(), &PhysicsConfig::default())
    }

    #[test]
    fn test_towel_resolution_and_mass() {
        let object = build(&ObjectInitMsg::towel(&unit_corners())).unwrap();
        let TrackedObject::Towel(towel) = &object else {
            panic!("expected a towel, got {}", object.object_type());
        };
        assert_eq!(towel.resolution(), (11, 11));
        assert_eq!(object.num_points(), 121);

        let factory = FactoryConfig::default();
        let mass = towel.sim().read().total_mass();
        assert_relative_eq!(mass, factory.surface_density * 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_towel_resolution_rounding() {
        assert_eq!(towel_resolution(1.0, 0.1), 11);
        assert_eq!(towel_resolution(0.96, 0.1), 11);
        assert_eq!(towel_resolution(0.5, 0.1), 6);
        assert_eq!(towel_resolution(0.01, 0.1), 2);
        assert_eq!(towel_resolution(1.0, 0.0), usize::MAX);
    }

    #[test]
    fn test_rope_from_nodes() {
        let nodes: Vec<Vector3<f64>> = (0..10)
            .map(|i| Vector3::new(0.1 * i as f64, 0.0, 0.0))
            .collect();
        let object = build(&ObjectInitMsg::rope(&nodes, 0.01)).unwrap();
        assert_eq!(object.object_type(), ObjectType::Rope);
        assert_eq!(object.num_points(), 10);
        for (p, n) in object.points().iter().zip(&nodes) {
            assert_relative_eq!(*p, *n, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_box_pose() {
        let init = ObjectInitMsg::cuboid(
            Vector3::new(0.5, 0.2, 0.1),
            Vector3::new(0.2, 0.1, 0.2),
            std::f64::consts::FRAC_PI_2,
        );
        let object = build(&init).unwrap();
        let TrackedObject::RigidBox(cuboid) = &object else {
            panic!("expected a box");
        };
        let sim = cuboid.sim();
        let body = sim.read();
        assert_relative_eq!(body.half_extents(), Vector3::new(0.1, 0.05, 0.1));
        assert_relative_eq!(body.pose().translation, Vector3::new(0.5, 0.2, 0.1));
        assert_relative_eq!(body.mass(), 1.0);
        assert_eq!(object.num_points(), 26);

        // Long axis rotated onto +Y
        let xs: Vec<f64> = body.corners().iter().map(|c| c.x).collect();
        let spread = xs.iter().cloned().fold(f64::MIN, f64::max)
            - xs.iter().cloned().fold(f64::MAX, f64::min);
        assert_relative_eq!(spread, 0.1, epsilon = 1e-9);
    }

    #[test]
    fn test_unrecognized_type_fails() {
        let init = ObjectInitMsg {
            object_type: "sponge".to_string(),
            rope: None,
            towel_corners: None,
            box_init: None,
        };
        assert!(matches!(
            build(&init),
            Err(TrackingError::UnrecognizedInitType(t)) if t == "sponge"
        ));
    }

    #[test]
    fn test_malformed_descriptions_fail() {
        let mut towel = ObjectInitMsg::towel(&unit_corners());
        if let Some(t) = towel.towel_corners.as_mut() {
            t.corners.pop();
        }
        assert!(matches!(build(&towel), Err(TrackingError::MalformedInit { .. })));

        let mut rope = ObjectInitMsg::rope(&[Vector3::zeros(), Vector3::x()], 0.01);
        rope.rope = None;
        assert!(matches!(build(&rope), Err(TrackingError::MalformedInit { .. })));

        let thin = ObjectInitMsg::rope(&[Vector3::zeros(), Vector3::x()], 0.0);
        assert!(matches!(build(&thin), Err(TrackingError::MalformedInit { .. })));

        let flat = ObjectInitMsg::cuboid(Vector3::zeros(), Vector3::new(0.1, 0.0, 0.1), 0.0);
        assert!(matches!(build(&flat), Err(TrackingError::MalformedInit { .. })));
    }

    #[test]
    fn test_non_finite_box_angle_is_reported() {
        let init = ObjectInitMsg::cuboid(Vector3::zeros(), Vector3::new(0.1, 0.1, 0.1), f64::NAN);
        match build(&init) {
            Err(TrackingError::MalformedInit { context }) => {
                assert!(context.contains("angle"), "context: {}", context)
            }
            other => panic!("expected malformed init, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_factory_config_is_an_error() {
        let factory = FactoryConfig {
            node_distance: 0.0,
            ..FactoryConfig::default()
        };
        let result = to_tracked_object(
            &ObjectInitMsg::towel(&unit_corners()),
            &factory,
            &PhysicsConfig::default(),
        );
        assert!(matches!(result, Err(TrackingError::Configuration { .. })));
    }

    #[test]
    fn test_invalid_physics_config_is_an_error() {
        let physics = PhysicsConfig {
            max_substeps: 0,
            ..PhysicsConfig::default()
        };
        let nodes = [Vector3::zeros(), Vector3::x()];
        let result = to_tracked_object(
            &ObjectInitMsg::rope(&nodes, 0.01),
            &FactoryConfig::default(),
            &physics,
        );
        assert!(matches!(result, Err(TrackingError::Configuration { .. })));
    }

    #[test]
    fn test_init_message_yaml() {
        let yaml = "type: box\nbox:\n  center: [0.0, 0.0, 0.1]\n  extents: [0.2, 0.2, 0.2]\n  angle: 0.0\n";
        let init: ObjectInitMsg = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(init.object_type, "box");
        assert!(init.rope.is_none());
        assert!(build(&init).is_ok());
    }

    struct FixedService(Option<ObjectInitMsg>);

    impl InitializationService for FixedService {
        fn request(&mut self, _cloud: &ObservedPointSet) -> Result<ObjectInitMsg, TrackingError> {
            self.0
                .take()
                .ok_or_else(|| TrackingError::InitializationFailed("no response".to_string()))
        }
    }

    #[test]
    fn test_service_round_trip_and_failure() {
        let mut service = FixedService(Some(ObjectInitMsg::towel(&unit_corners())));
        let cloud = ObservedPointSet::empty();
        let factory = FactoryConfig::default();
        let physics = PhysicsConfig::default();

        let object = create_object_from_service(&mut service, &cloud, &factory, &physics).unwrap();
        assert_eq!(object.object_type(), ObjectType::Towel);

        let second = create_object_from_service(&mut service, &cloud, &factory, &physics);
        assert!(matches!(second, Err(TrackingError::InitializationFailed(_))));
    }
}
