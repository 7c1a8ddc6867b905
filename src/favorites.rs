use serde_json::Value;

use crate::apartment::ApartmentId;
use crate::session::Session;

pub const FAVORITE_APARTMENTS_KEY: &str = "favorite_apartments";

/// Ordered set of favorite apartment ids kept in the requester's session.
pub struct Favorites<'a, S: Session + ?Sized> {
    session: &'a mut S,
}

impl<'a, S: Session + ?Sized> Favorites<'a, S> {
    pub fn new(session: &'a mut S) -> Self {
        Self { session }
    }

    pub fn list(&self) -> Vec<ApartmentId> {
        list(&*self.session)
    }

    pub fn is_member(&self, id: ApartmentId) -> bool {
        self.list().contains(&id)
    }

    /// Returns false when the id was already present.
    pub fn add(&mut self, id: ApartmentId) -> bool {
        let mut ids = self.list();
        if ids.contains(&id) {
            return false;
        }
        ids.push(id);
        self.store(ids);
        true
    }

    /// Returns false when the id was absent.
    pub fn remove(&mut self, id: ApartmentId) -> bool {
        let mut ids = self.list();
        let before = ids.len();
        ids.retain(|x| *x != id);
        if ids.len() == before {
            return false;
        }
        self.store(ids);
        true
    }

    fn store(&mut self, ids: Vec<ApartmentId>) {
        self.session.set(FAVORITE_APARTMENTS_KEY, Value::from(ids));
    }
}

/// Read-only view for contexts that only hold a shared session.
pub fn list<S: Session + ?Sized>(session: &S) -> Vec<ApartmentId> {
    session
        .get(FAVORITE_APARTMENTS_KEY)
        .and_then(Value::as_array)
        .map(|ids| ids.iter().filter_map(Value::as_i64).collect())
        .unwrap_or_default()
}
