//! Owner frames and deferred assignments.
//!
//! Every managed record under construction owns a frame. Expression rules
//! queue a [`PendingAction`] on the innermost frame; the actions run after
//! the owner's first save, when it has an identifier.

use std::fmt;

use graphseed_core::{Record, Value};

/// Step from an owner record to a nested embedded record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    /// Embedded object held by a property.
    Property(String),
    /// Element of a set value.
    Element(usize),
    /// Value of the n-th map pair.
    MapValue(usize),
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSegment::Property(name) => write!(f, ".{name}"),
            PathSegment::Element(idx) => write!(f, "[{idx}]"),
            PathSegment::MapValue(idx) => write!(f, "{{{idx}}}"),
        }
    }
}

/// Assignment deferred until the owner is saved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingAction {
    /// Path from the owner to the record receiving the value.
    pub target: Vec<PathSegment>,
    pub property: String,
    pub expression: String,
}

impl PendingAction {
    pub fn describe_target(&self) -> String {
        let path: String = self.target.iter().map(ToString::to_string).collect();
        format!("this{path}.{}", self.property)
    }
}

/// One record under construction.
#[derive(Debug, Clone)]
pub struct OwnerFrame {
    pub type_name: String,
    pub pending: Vec<PendingAction>,
}

/// Stack of records under construction, innermost last.
#[derive(Debug, Default)]
pub struct OwnerStack {
    frames: Vec<OwnerFrame>,
}

impl OwnerStack {
    pub fn push(&mut self, type_name: &str) {
        self.frames.push(OwnerFrame {
            type_name: type_name.to_string(),
            pending: Vec::new(),
        });
    }

    pub fn pop(&mut self) -> Option<OwnerFrame> {
        self.frames.pop()
    }

    /// Queue an action on the innermost frame. Returns false when the stack
    /// is empty.
    pub fn defer(&mut self, action: PendingAction) -> bool {
        match self.frames.last_mut() {
            Some(frame) => {
                frame.pending.push(action);
                true
            }
            None => false,
        }
    }

    /// Point the innermost frame's actions below `from` at `to` instead.
    pub fn retarget(&mut self, from: &[PathSegment], to: &[PathSegment]) {
        let Some(frame) = self.frames.last_mut() else {
            return;
        };
        for action in &mut frame.pending {
            if action.target.starts_with(from) {
                let rest = action.target.split_off(from.len());
                action.target = to.iter().cloned().chain(rest).collect();
            }
        }
    }

    /// Drop the innermost frame's actions below `prefix`.
    pub fn discard(&mut self, prefix: &[PathSegment]) {
        if let Some(frame) = self.frames.last_mut() {
            frame
                .pending
                .retain(|action| !action.target.starts_with(prefix));
        }
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

/// Where the record being populated sits relative to its owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Cursor {
    /// Inside the owner at this path; deferred actions are allowed.
    Attached(Vec<PathSegment>),
    /// Building a lookup criterion; there is no owner to defer to.
    Detached,
}

impl Cursor {
    pub(crate) fn root() -> Self {
        Cursor::Attached(Vec::new())
    }

    pub(crate) fn child(&self, segment: PathSegment) -> Self {
        match self {
            Cursor::Attached(path) => {
                let mut path = path.clone();
                path.push(segment);
                Cursor::Attached(path)
            }
            Cursor::Detached => Cursor::Detached,
        }
    }
}

/// Embedded record reached from `record` along `path`.
pub(crate) fn target_record_mut<'r>(
    record: &'r mut Record,
    path: &[PathSegment],
) -> Option<&'r mut Record> {
    match path.split_first() {
        None => Some(record),
        Some((PathSegment::Property(name), rest)) => descend(record.get_mut(name)?, rest),
        Some(_) => None,
    }
}

fn descend<'r>(value: &'r mut Value, path: &[PathSegment]) -> Option<&'r mut Record> {
    match (value, path.split_first()) {
        (Value::Object(record), _) => target_record_mut(record, path),
        (Value::Set(items), Some((PathSegment::Element(idx), rest))) => {
            descend(items.get_mut(*idx)?, rest)
        }
        (Value::Map(pairs), Some((PathSegment::MapValue(idx), rest))) => {
            descend(&mut pairs.get_mut(*idx)?.1, rest)
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn navigates_embedded_objects_sets_and_maps() {
        let mut street = Record::new("Street");
        street.set("name", Value::Text("Main".to_string()));

        let mut address = Record::new("Address");
        address.set("streets", Value::Set(vec![Value::Object(Box::new(street))]));

        let mut owner = Record::new("City");
        owner.set(
            "addresses",
            Value::Map(vec![(Value::Int(1), Value::Object(Box::new(address)))]),
        );

        let path = vec![
            PathSegment::Property("addresses".to_string()),
            PathSegment::MapValue(0),
            PathSegment::Property("streets".to_string()),
            PathSegment::Element(0),
        ];
        let target = target_record_mut(&mut owner, &path).expect("target");
        assert_eq!(target.type_name(), "Street");

        assert!(target_record_mut(&mut owner, &[PathSegment::Element(0)]).is_none());
    }

    #[test]
    fn frames_collect_actions_innermost_first() {
        let mut owners = OwnerStack::default();
        let action = PendingAction {
            target: Vec::new(),
            property: "self_ref".to_string(),
            expression: "this".to_string(),
        };
        assert!(!owners.defer(action.clone()));

        owners.push("City");
        owners.push("District");
        assert!(owners.defer(action.clone()));
        assert_eq!(owners.depth(), 2);

        let inner = owners.pop().expect("inner frame");
        assert_eq!(inner.type_name, "District");
        assert_eq!(inner.pending, vec![action]);
        let outer = owners.pop().expect("outer frame");
        assert!(outer.pending.is_empty());
        assert!(owners.is_empty());
    }

    #[test]
    fn retarget_and_discard_touch_only_matching_paths() {
        let action = |target: Vec<PathSegment>| PendingAction {
            target,
            property: "resident".to_string(),
            expression: "this".to_string(),
        };
        let homes = PathSegment::Property("homes".to_string());

        let mut owners = OwnerStack::default();
        owners.retarget(&[PathSegment::Element(0)], &[PathSegment::Element(1)]);
        owners.push("Person");
        assert!(owners.defer(action(vec![homes.clone(), PathSegment::MapValue(0)])));
        assert!(owners.defer(action(vec![homes.clone(), PathSegment::MapValue(1)])));
        assert!(owners.defer(action(vec![
            homes.clone(),
            PathSegment::MapValue(2),
            PathSegment::Property("garden".to_string()),
        ])));

        owners.discard(&[homes.clone(), PathSegment::MapValue(0)]);
        owners.retarget(
            &[homes.clone(), PathSegment::MapValue(2)],
            &[homes.clone(), PathSegment::MapValue(0)],
        );

        let frame = owners.pop().expect("frame");
        let targets: Vec<String> = frame.pending.iter().map(PendingAction::describe_target).collect();
        assert_eq!(
            targets,
            vec![
                "this.homes{1}.resident".to_string(),
                "this.homes{0}.garden.resident".to_string(),
            ]
        );
    }

    #[test]
    fn cursor_children_extend_the_path() {
        let cursor = Cursor::root().child(PathSegment::Property("address".to_string()));
        assert_eq!(
            cursor,
            Cursor::Attached(vec![PathSegment::Property("address".to_string())])
        );
        assert_eq!(
            Cursor::Detached.child(PathSegment::Element(1)),
            Cursor::Detached
        );
    }
}
