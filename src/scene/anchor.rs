use super::arena::ObjectId;
use crate::math::Transform;

/// Placement socket holding at most one object.
#[derive(Debug, Clone)]
pub struct GrabbableAnchor {
    pub name: String,
    pub enabled: bool,
    /// Tags accepted by this anchor; empty accepts every object.
    pub compatible_tags: Vec<String>,
    /// Range within which a released object is placed here.
    pub max_placing_distance: f32,
    pub(crate) local: Transform,
    pub(crate) parent: Option<ObjectId>,
    pub(crate) current_placed_object: Option<ObjectId>,
}

impl GrabbableAnchor {
    pub fn new(name: impl Into<String>, local: Transform) -> Self {
        Self {
            name: name.into(),
            enabled: true,
            compatible_tags: Vec::new(),
            max_placing_distance: 0.1,
            local,
            parent: None,
            current_placed_object: None,
        }
    }

    /// Attaches the anchor to a grabbable object so it moves with it.
    pub fn attached_to(mut self, object: ObjectId) -> Self {
        self.parent = Some(object);
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.compatible_tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_max_placing_distance(mut self, distance: f32) -> Self {
        self.max_placing_distance = distance;
        self
    }

    pub fn local_transform(&self) -> Transform {
        self.local
    }

    pub fn parent(&self) -> Option<ObjectId> {
        self.parent
    }

    pub fn current_placed_object(&self) -> Option<ObjectId> {
        self.current_placed_object
    }

    pub fn is_occupied(&self) -> bool {
        self.current_placed_object.is_some()
    }

    pub fn accepts_tag(&self, tag: Option<&str>) -> bool {
        if self.compatible_tags.is_empty() {
            return true;
        }
        tag.is_some_and(|t| self.compatible_tags.iter().any(|c| c == t))
    }
}
