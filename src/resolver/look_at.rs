use crate::math::{grab_weight, rotation_between, Transform};
use crate::runtime::RuntimeGrabInfo;
use glam::{Quat, Vec3};

/// Object pose asked for by several grabs at once.
///
/// The first grab sets the starting pose. Each further grab turns the object
/// around the first grab point so that its own grab point looks at its
/// grabber, weighted by [`grab_weight`]. With `center` set, half of the
/// remaining gap is split between the grabs.
pub(crate) fn look_at_average(
    grabs: &[RuntimeGrabInfo],
    poses: &[Transform],
    scale: Vec3,
    center: bool,
) -> Option<Transform> {
    let (first, first_pose) = (grabs.first()?, poses.first()?);

    let mut solved = first.target_object_pose(first_pose);
    solved.scale = scale;
    let mut pivot = first.current_leverage_point(first_pose);

    for (i, (grab, pose)) in grabs.iter().zip(poses).enumerate().skip(1) {
        let weight = grab_weight(i);
        let target = grab.current_leverage_point(pose);
        let current = solved.transform_point(grab.leverage_source_local);

        let arc = rotation_between(current - pivot, target - pivot);
        solved.rotate_around(pivot, Quat::IDENTITY.slerp(arc, weight));

        if center {
            let residual = target - solved.transform_point(grab.leverage_source_local);
            let shift = residual * (0.5 * weight);
            solved.position += shift;
            pivot += shift;
        }
    }

    Some(solved)
}

/// Pose with the rotation of `before` whose grab point follows the grabber.
pub(crate) fn follow_without_rotation(
    before: &Transform,
    grab: &RuntimeGrabInfo,
    pose: &Transform,
) -> Transform {
    let mut solved = *before;
    solved.position +=
        grab.current_leverage_point(pose) - before.transform_point(grab.leverage_source_local);
    solved
}
