use std::any::{Any, TypeId};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use graphwire_structures::{
    FieldBag, GraphWireError, GraphWireResult, ScalarValue, Value,
};
use uuid::Uuid;

/// Populates a shell instance from a resolved field bag.
pub type PopulateFn = Box<dyn Fn(&mut dyn Any, &FieldBag) -> GraphWireResult<()> + Send + Sync>;

/// An externally registered collect/populate strategy for a type that cannot
/// describe itself.
pub struct Surrogate {
    type_id: TypeId,
    type_name: String,
    collect: Box<dyn Fn(&dyn Any, &mut FieldBag) -> GraphWireResult<()> + Send + Sync>,
    shell: Box<dyn Fn() -> Box<dyn Any> + Send + Sync>,
    populate: PopulateFn,
}

impl Surrogate {
    /// Builds a surrogate for concrete type `T` from typed hooks.
    pub fn new<T: Any>(
        type_name: impl Into<String>,
        collect: impl Fn(&T, &mut FieldBag) -> GraphWireResult<()> + Send + Sync + 'static,
        shell: impl Fn() -> T + Send + Sync + 'static,
        populate: impl Fn(&mut T, &FieldBag) -> GraphWireResult<()> + Send + Sync + 'static,
    ) -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: type_name.into(),
            collect: Box::new(move |instance, bag| match instance.downcast_ref::<T>() {
                Some(concrete) => collect(concrete, bag),
                None => Err(GraphWireError::BadArgument(
                    "Surrogate collect invoked against the wrong concrete type!".into(),
                )),
            }),
            shell: Box::new(move || Box::new(shell())),
            populate: Box::new(move |instance, bag| match instance.downcast_mut::<T>() {
                Some(concrete) => populate(concrete, bag),
                None => Err(GraphWireError::BadArgument(
                    "Surrogate populate invoked against the wrong concrete type!".into(),
                )),
            }),
        }
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn collect(&self, instance: &dyn Any) -> GraphWireResult<FieldBag> {
        let mut bag = FieldBag::new();
        (self.collect)(instance, &mut bag)?;
        Ok(bag)
    }

    pub fn make_shell(&self) -> Box<dyn Any> {
        (self.shell)()
    }

    pub fn populate(&self, instance: &mut dyn Any, bag: &FieldBag) -> GraphWireResult<()> {
        (self.populate)(instance, bag)
    }
}

/// Ordered list of surrogates, matched by exact `TypeId` equality in
/// registration order. No supertype or interface matching is attempted.
pub struct SurrogateRegistry {
    entries: Vec<Surrogate>,
}

impl SurrogateRegistry {
    /// A registry pre-loaded with the built-in surrogates for common value
    /// types: durations, timestamps and opaque identifiers.
    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        registry.register(duration_surrogate());
        registry.register(system_time_surrogate());
        registry.register(uuid_surrogate());
        registry
    }

    pub fn empty() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub fn register(&mut self, surrogate: Surrogate) {
        self.entries.push(surrogate);
    }

    /// First registered surrogate whose target type exactly equals `type_id`.
    pub fn find(&self, type_id: TypeId) -> Option<(usize, &Surrogate)> {
        self.entries
            .iter()
            .enumerate()
            .find(|(_, surrogate)| surrogate.type_id == type_id)
    }

    pub fn find_named(&self, type_name: &str) -> Option<(usize, &Surrogate)> {
        self.entries
            .iter()
            .enumerate()
            .find(|(_, surrogate)| surrogate.type_name == type_name)
    }

    pub fn get(&self, index: usize) -> Option<&Surrogate> {
        self.entries.get(index)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for SurrogateRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

//region Built-In Surrogates

fn bag_u64(bag: &FieldBag, name: &str) -> GraphWireResult<u64> {
    match bag.get(name).and_then(Value::as_scalar) {
        Some(ScalarValue::U64(v)) => Ok(v),
        _ => Err(GraphWireError::ContractViolation(format!(
            "Expected u64 field '{}' in surrogate data!",
            name
        ))),
    }
}

fn bag_u32(bag: &FieldBag, name: &str) -> GraphWireResult<u32> {
    match bag.get(name).and_then(Value::as_scalar) {
        Some(ScalarValue::U32(v)) => Ok(v),
        _ => Err(GraphWireError::ContractViolation(format!(
            "Expected u32 field '{}' in surrogate data!",
            name
        ))),
    }
}

fn bag_str<'a>(bag: &'a FieldBag, name: &str) -> GraphWireResult<&'a str> {
    match bag.get(name).and_then(Value::as_str) {
        Some(v) => Ok(v),
        None => Err(GraphWireError::ContractViolation(format!(
            "Expected string field '{}' in surrogate data!",
            name
        ))),
    }
}

fn duration_surrogate() -> Surrogate {
    Surrogate::new::<Duration>(
        "std::time::Duration",
        |duration, bag| {
            bag.insert("secs", Value::from(duration.as_secs()));
            bag.insert("nanos", Value::from(duration.subsec_nanos()));
            Ok(())
        },
        Duration::default,
        |duration, bag| {
            *duration = Duration::new(bag_u64(bag, "secs")?, bag_u32(bag, "nanos")?);
            Ok(())
        },
    )
}

fn system_time_surrogate() -> Surrogate {
    Surrogate::new::<SystemTime>(
        "std::time::SystemTime",
        |time, bag| {
            let since_epoch = time.duration_since(UNIX_EPOCH).map_err(|_| {
                GraphWireError::BadArgument(
                    "Cannot serialize a SystemTime earlier than the Unix epoch!".into(),
                )
            })?;
            bag.insert("unix_secs", Value::from(since_epoch.as_secs()));
            bag.insert("unix_nanos", Value::from(since_epoch.subsec_nanos()));
            Ok(())
        },
        || UNIX_EPOCH,
        |time, bag| {
            *time = UNIX_EPOCH
                + Duration::new(bag_u64(bag, "unix_secs")?, bag_u32(bag, "unix_nanos")?);
            Ok(())
        },
    )
}

fn uuid_surrogate() -> Surrogate {
    Surrogate::new::<Uuid>(
        "uuid::Uuid",
        |uuid, bag| {
            bag.insert("uuid", Value::from(uuid.hyphenated().to_string()));
            Ok(())
        },
        Uuid::nil,
        |uuid, bag| {
            *uuid = Uuid::parse_str(bag_str(bag, "uuid")?).map_err(|parse_error| {
                GraphWireError::ContractViolation(format!(
                    "Surrogate field 'uuid' does not hold a valid UUID: {}",
                    parse_error
                ))
            })?;
            Ok(())
        },
    )
}

//endregion

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtins_are_registered_in_order() {
        let registry = SurrogateRegistry::with_builtins();
        assert_eq!(registry.len(), 3);
        let (index, surrogate) = registry.find(TypeId::of::<Duration>()).unwrap();
        assert_eq!(index, 0);
        assert_eq!(surrogate.type_name(), "std::time::Duration");
        assert!(registry.find(TypeId::of::<String>()).is_none());
    }

    #[test]
    fn matching_is_exact_type_only() {
        let registry = SurrogateRegistry::with_builtins();
        // An Option<Duration> is a different concrete type and must not match.
        assert!(registry.find(TypeId::of::<Option<Duration>>()).is_none());
    }

    #[test]
    fn duration_collect_populate_round_trip() {
        let registry = SurrogateRegistry::with_builtins();
        let (_, surrogate) = registry.find(TypeId::of::<Duration>()).unwrap();
        let source = Duration::new(42, 7);
        let bag = surrogate.collect(&source).unwrap();
        let mut shell = surrogate.make_shell();
        surrogate.populate(shell.as_mut(), &bag).unwrap();
        assert_eq!(shell.downcast_ref::<Duration>(), Some(&source));
    }

    #[test]
    fn system_time_collect_populate_round_trip() {
        let registry = SurrogateRegistry::with_builtins();
        let (_, surrogate) = registry.find(TypeId::of::<SystemTime>()).unwrap();
        let source = UNIX_EPOCH + Duration::new(1_700_000_000, 250);
        let bag = surrogate.collect(&source).unwrap();
        let mut shell = surrogate.make_shell();
        surrogate.populate(shell.as_mut(), &bag).unwrap();
        assert_eq!(shell.downcast_ref::<SystemTime>(), Some(&source));
    }

    #[test]
    fn pre_epoch_system_time_is_rejected() {
        let registry = SurrogateRegistry::with_builtins();
        let (_, surrogate) = registry.find(TypeId::of::<SystemTime>()).unwrap();
        let before_epoch = UNIX_EPOCH - Duration::from_secs(1);
        assert!(matches!(
            surrogate.collect(&before_epoch),
            Err(GraphWireError::BadArgument(_))
        ));
    }

    #[test]
    fn uuid_collect_populate_round_trip() {
        let registry = SurrogateRegistry::with_builtins();
        let (_, surrogate) = registry.find(TypeId::of::<Uuid>()).unwrap();
        let source = Uuid::parse_str("67e55044-10b1-426f-9247-bb680e5fe0c8").unwrap();
        let bag = surrogate.collect(&source).unwrap();
        assert_eq!(
            bag.get("uuid").and_then(Value::as_str),
            Some("67e55044-10b1-426f-9247-bb680e5fe0c8")
        );
        let mut shell = surrogate.make_shell();
        surrogate.populate(shell.as_mut(), &bag).unwrap();
        assert_eq!(shell.downcast_ref::<Uuid>(), Some(&source));
    }

    #[test]
    fn invalid_uuid_string_is_rejected() {
        let registry = SurrogateRegistry::with_builtins();
        let (_, surrogate) = registry.find(TypeId::of::<Uuid>()).unwrap();
        let mut bag = FieldBag::new();
        bag.insert("uuid", Value::from("not-a-uuid"));
        let mut shell = surrogate.make_shell();
        assert!(matches!(
            surrogate.populate(shell.as_mut(), &bag),
            Err(GraphWireError::ContractViolation(_))
        ));
    }

    #[test]
    fn first_registration_wins() {
        let mut registry = SurrogateRegistry::empty();
        registry.register(duration_surrogate());
        registry.register(Surrogate::new::<Duration>(
            "shadowed",
            |_, _| Ok(()),
            Duration::default,
            |_, _| Ok(()),
        ));
        let (index, surrogate) = registry.find(TypeId::of::<Duration>()).unwrap();
        assert_eq!(index, 0);
        assert_eq!(surrogate.type_name(), "std::time::Duration");
    }
}
