//! Request handlers.
//!
//! Each handler resolves its target record, checks the access policy,
//! validates the submission and then either writes through the [`Store`]
//! and redirects, or renders a view with field-scoped errors. Handlers are
//! synchronous and run to completion; the web adapter only translates
//! HTTP in and out.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::apartment::{Apartment, ApartmentForm, ApartmentId, ApartmentType};
use crate::booking::{Booking, BookingForm, BookingId, BookingStatus, NewBooking, StatusForm};
use crate::error::AppError;
use crate::favorites::{self, Favorites};
use crate::route::{Route, View};
use crate::session::{self, Level, Session};
use crate::store::{ApartmentFilter, Store, StoreResult};
use crate::user::User;

pub type HandlerResult = Result<Response, AppError>;

#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    Render { view: View, context: Value },
    Redirect(Route),
}

/// Collaborators for one inbound request.
pub struct Request<'a> {
    pub store: &'a dyn Store,
    pub session: &'a mut dyn Session,
    pub user: Option<&'a User>,
    pub now: DateTime<Utc>,
}

impl<'a> Request<'a> {
    pub fn today(&self) -> NaiveDate {
        self.now.date_naive()
    }

    pub fn flash(&mut self, level: Level, text: impl Into<String>) {
        session::flash(&mut *self.session, level, text);
    }

    fn require_user(&self) -> Result<&'a User, AppError> {
        self.user.ok_or(AppError::Unauthenticated)
    }

    fn require_staff(&self, fallback: Route) -> Result<&'a User, AppError> {
        let user = self.require_user()?;
        if !user.is_staff {
            log::warn!("User '{}' is not staff, denied", user.username);
            return Err(AppError::Forbidden {
                message: "Only staff can manage apartments".to_string(),
                fallback,
            });
        }
        Ok(user)
    }

    fn load_apartment(&self, id: ApartmentId) -> Result<Apartment, AppError> {
        self.store.apartment(id)?.ok_or(AppError::NotFound)
    }

    fn load_booking(&self, user: &User, id: BookingId) -> Result<Booking, AppError> {
        let booking = self.store.booking(id)?.ok_or(AppError::NotFound)?;
        if !user.may_view_booking_of(booking.user_id) {
            log::warn!(
                "User '{}' denied access to booking {} of user {}",
                user.username,
                id,
                booking.user_id
            );
            return Err(AppError::Forbidden {
                message: "You do not have access to this booking".to_string(),
                fallback: Route::BookingList,
            });
        }
        Ok(booking)
    }

    /// Adds the values every page gets (favorites, flash messages, requester).
    fn render(&mut self, view: View, context: Value) -> Response {
        let mut context = match context {
            Value::Object(map) => map,
            other => {
                let mut map = Map::new();
                map.insert("data".to_string(), other);
                map
            }
        };
        let favorite_ids = favorites::list(&*self.session);
        context.insert("favorites_count".into(), Value::from(favorite_ids.len()));
        context.insert("favorite_ids".into(), Value::from(favorite_ids));
        let messages = session::take_messages(&mut *self.session);
        context.insert("messages".into(), json!(messages));
        context.insert("user".into(), json!(self.user));
        Response::Render {
            view,
            context: Value::Object(context),
        }
    }
}

/// Turns policy failures into redirects. `NotFound` and storage errors pass through.
pub fn respond(req: &mut Request, result: HandlerResult, path: &str) -> HandlerResult {
    match result {
        Err(AppError::Forbidden { message, fallback }) => {
            req.flash(Level::Error, message);
            Ok(Response::Redirect(fallback))
        }
        Err(AppError::Unauthenticated) => Ok(Response::Redirect(Route::Login {
            next: path.to_string(),
        })),
        other => other,
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ListQuery {
    pub available: Option<String>,
    #[serde(rename = "type")]
    pub apartment_type: Option<String>,
    pub q: Option<String>,
    pub page: Option<String>,
}

impl ListQuery {
    fn available(&self) -> Option<bool> {
        match self.available.as_deref().map(str::trim) {
            Some("true" | "1" | "yes" | "on") => Some(true),
            Some("false" | "0" | "no" | "off") => Some(false),
            _ => None,
        }
    }

    fn apartment_type(&self) -> Option<ApartmentType> {
        self.apartment_type
            .as_deref()
            .and_then(|t| t.trim().parse().ok())
    }

    fn page(&self) -> usize {
        self.page
            .as_deref()
            .and_then(|p| p.trim().parse().ok())
            .unwrap_or(1)
    }

    fn filter(&self) -> ApartmentFilter {
        ApartmentFilter {
            available: self.available(),
            apartment_type: self.apartment_type(),
            search: self
                .q
                .as_deref()
                .map(str::trim)
                .filter(|q| !q.is_empty())
                .map(str::to_string),
            ..Default::default()
        }
    }
}

fn apartment_types() -> Value {
    ApartmentType::ALL
        .iter()
        .map(|t| json!({ "code": t.code(), "label": t.label() }))
        .collect()
}

pub fn home(req: &mut Request) -> HandlerResult {
    let apartments = req.store.apartments(&ApartmentFilter {
        newest_first: true,
        ..Default::default()
    })?;
    Ok(req.render(View::Home, json!({ "apartments": apartments })))
}

pub fn apartment_list(req: &mut Request, query: &ListQuery, page_size: usize) -> HandlerResult {
    let mut filter = query.filter();
    let total = req.store.count_apartments(&filter)?;
    let page_size = page_size.max(1);
    let num_pages = total.div_ceil(page_size).max(1);
    let page = query.page().clamp(1, num_pages);
    filter.limit = Some(page_size);
    filter.offset = Some((page - 1) * page_size);
    let apartments = req.store.apartments(&filter)?;
    Ok(req.render(
        View::ApartmentList,
        json!({
            "apartments": apartments,
            "page": page,
            "num_pages": num_pages,
            "total": total,
            "filters": {
                "available": filter.available,
                "type": filter.apartment_type.map(|t| t.code()),
                "q": filter.search,
            },
            "apartment_types": apartment_types(),
        }),
    ))
}

pub fn apartment_detail(req: &mut Request, id: ApartmentId) -> HandlerResult {
    let apartment = req.load_apartment(id)?;
    let is_favorite = favorites::list(&*req.session).contains(&id);
    let can_edit = req.user.is_some_and(|u| u.is_staff);
    let can_book = req.user.is_some() && apartment.is_available;
    Ok(req.render(
        View::ApartmentDetail,
        json!({
            "apartment": apartment,
            "type_label": apartment.apartment_type.label(),
            "is_favorite": is_favorite,
            "can_edit": can_edit,
            "can_book": can_book,
        }),
    ))
}

pub fn apartment_create_form(req: &mut Request) -> HandlerResult {
    req.require_staff(Route::ApartmentList)?;
    let form = ApartmentForm {
        is_available: Some("on".to_string()),
        ..Default::default()
    };
    Ok(req.render(
        View::ApartmentForm,
        json!({ "form": form, "errors": [], "apartment": null, "apartment_types": apartment_types() }),
    ))
}

pub fn apartment_create(req: &mut Request, form: &ApartmentForm) -> HandlerResult {
    let user = req.require_staff(Route::ApartmentList)?;
    match form.validate() {
        Ok(draft) => {
            let apartment = req.store.insert_apartment(&draft, req.now)?;
            log::info!(
                "Apartment {} created by '{}': {}",
                apartment.id,
                user.username,
                apartment
            );
            req.flash(
                Level::Success,
                format!("Apartment '{}' created", apartment.title),
            );
            Ok(Response::Redirect(Route::ApartmentDetail(apartment.id)))
        }
        Err(errors) => {
            log::debug!("Apartment form rejected: {} error(s)", errors.len());
            Ok(req.render(
                View::ApartmentForm,
                json!({ "form": form, "errors": errors, "apartment": null, "apartment_types": apartment_types() }),
            ))
        }
    }
}

pub fn apartment_update_form(req: &mut Request, id: ApartmentId) -> HandlerResult {
    let apartment = req.load_apartment(id)?;
    req.require_staff(Route::ApartmentDetail(id))?;
    let form = ApartmentForm::from(&apartment);
    Ok(req.render(
        View::ApartmentForm,
        json!({ "form": form, "errors": [], "apartment": apartment, "apartment_types": apartment_types() }),
    ))
}

pub fn apartment_update(req: &mut Request, id: ApartmentId, form: &ApartmentForm) -> HandlerResult {
    let apartment = req.load_apartment(id)?;
    let user = req.require_staff(Route::ApartmentDetail(id))?;
    match form.validate() {
        Ok(draft) => {
            let updated = req.store.update_apartment(id, &draft, req.now)?;
            log::info!("Apartment {} updated by '{}': {}", id, user.username, updated);
            req.flash(
                Level::Success,
                format!("Apartment '{}' updated", updated.title),
            );
            Ok(Response::Redirect(Route::ApartmentDetail(id)))
        }
        Err(errors) => Ok(req.render(
            View::ApartmentForm,
            json!({ "form": form, "errors": errors, "apartment": apartment, "apartment_types": apartment_types() }),
        )),
    }
}

pub fn apartment_delete_confirm(req: &mut Request, id: ApartmentId) -> HandlerResult {
    let apartment = req.load_apartment(id)?;
    req.require_staff(Route::ApartmentDetail(id))?;
    Ok(req.render(
        View::ApartmentConfirmDelete,
        json!({ "apartment": apartment }),
    ))
}

pub fn apartment_delete(req: &mut Request, id: ApartmentId) -> HandlerResult {
    let apartment = req.load_apartment(id)?;
    let user = req.require_staff(Route::ApartmentDetail(id))?;
    if !req.store.delete_apartment(id)? {
        return Err(AppError::NotFound);
    }
    Favorites::new(&mut *req.session).remove(id);
    log::info!("Apartment {} deleted by '{}': {}", id, user.username, apartment);
    req.flash(
        Level::Success,
        format!("Apartment '{}' deleted", apartment.title),
    );
    Ok(Response::Redirect(Route::ApartmentList))
}

pub fn add_to_favorites(req: &mut Request, id: ApartmentId) -> HandlerResult {
    let apartment = req.load_apartment(id)?;
    if Favorites::new(&mut *req.session).add(id) {
        req.flash(
            Level::Success,
            format!("'{}' added to favorites", apartment.title),
        );
    } else {
        req.flash(
            Level::Info,
            format!("'{}' is already in favorites", apartment.title),
        );
    }
    Ok(Response::Redirect(Route::ApartmentDetail(id)))
}

pub fn remove_from_favorites(req: &mut Request, id: ApartmentId) -> HandlerResult {
    if Favorites::new(&mut *req.session).remove(id) {
        req.flash(Level::Success, "Removed from favorites");
    }
    Ok(Response::Redirect(Route::FavoritesList))
}

pub fn favorites_list(req: &mut Request) -> HandlerResult {
    let ids = favorites::list(&*req.session);
    let apartments = req.store.apartments_by_ids(&ids)?;
    Ok(req.render(
        View::FavoritesList,
        json!({ "apartments": apartments }),
    ))
}

pub fn booking_create_form(req: &mut Request, apartment_id: ApartmentId) -> HandlerResult {
    req.require_user()?;
    let apartment = req.load_apartment(apartment_id)?;
    if !apartment.is_available {
        req.flash(Level::Error, "This apartment is not available for booking");
        return Ok(Response::Redirect(Route::ApartmentDetail(apartment_id)));
    }
    Ok(req.render(
        View::BookingForm,
        json!({ "apartment": apartment, "form": BookingForm::default(), "errors": [] }),
    ))
}

pub fn booking_create(
    req: &mut Request,
    apartment_id: ApartmentId,
    form: &BookingForm,
) -> HandlerResult {
    let user = req.require_user()?;
    let apartment = req.load_apartment(apartment_id)?;
    if !apartment.is_available {
        req.flash(Level::Error, "This apartment is not available for booking");
        return Ok(Response::Redirect(Route::ApartmentDetail(apartment_id)));
    }
    match form.validate(req.today()) {
        Ok((stay, notes)) => {
            let booking = req.store.create_booking(
                &NewBooking {
                    apartment_id,
                    user_id: user.id,
                    stay,
                    notes,
                },
                req.now,
            )?;
            log::info!(
                "Booking {} created by '{}' for apartment {}: {} night(s), {}$",
                booking.id,
                user.username,
                apartment_id,
                stay.nights,
                booking.total_price
            );
            req.flash(
                Level::Success,
                format!(
                    "Booking created: {} night(s), total {}$",
                    stay.nights, booking.total_price
                ),
            );
            Ok(Response::Redirect(Route::BookingDetail(booking.id)))
        }
        Err(errors) => Ok(req.render(
            View::BookingForm,
            json!({ "apartment": apartment, "form": form, "errors": errors }),
        )),
    }
}

fn with_apartments(store: &dyn Store, bookings: Vec<Booking>) -> StoreResult<Vec<Value>> {
    let mut ids: Vec<ApartmentId> = bookings.iter().map(|b| b.apartment_id).collect();
    ids.sort_unstable();
    ids.dedup();
    let apartments = store.apartments_by_ids(&ids)?;
    Ok(bookings
        .into_iter()
        .map(|booking| {
            let apartment = apartments.iter().find(|a| a.id == booking.apartment_id);
            let nights = booking.nights();
            json!({ "booking": booking, "apartment": apartment, "nights": nights })
        })
        .collect())
}

pub fn booking_list(req: &mut Request) -> HandlerResult {
    let user = req.require_user()?;
    let owner = if user.is_staff { None } else { Some(user.id) };
    let bookings = with_apartments(req.store, req.store.bookings(owner)?)?;
    Ok(req.render(View::BookingList, json!({ "bookings": bookings })))
}

pub fn booking_detail(req: &mut Request, id: BookingId) -> HandlerResult {
    let user = req.require_user()?;
    let booking = req.load_booking(user, id)?;
    let apartment = req.store.apartment(booking.apartment_id)?;
    let can_cancel = booking.status != BookingStatus::Cancelled;
    let nights = booking.nights();
    Ok(req.render(
        View::BookingDetail,
        json!({
            "booking": booking,
            "apartment": apartment,
            "nights": nights,
            "can_cancel": can_cancel,
            "can_manage": user.is_staff,
        }),
    ))
}

pub fn booking_cancel_confirm(req: &mut Request, id: BookingId) -> HandlerResult {
    let user = req.require_user()?;
    let booking = req.load_booking(user, id)?;
    if booking.status == BookingStatus::Cancelled {
        req.flash(Level::Warning, "This booking is already cancelled");
        return Ok(Response::Redirect(Route::BookingDetail(id)));
    }
    Ok(req.render(
        View::BookingConfirmCancel,
        json!({ "booking": booking }),
    ))
}

pub fn booking_cancel(req: &mut Request, id: BookingId) -> HandlerResult {
    let user = req.require_user()?;
    let booking = req.load_booking(user, id)?;
    if booking.status == BookingStatus::Cancelled {
        req.flash(Level::Warning, "This booking is already cancelled");
        return Ok(Response::Redirect(Route::BookingDetail(id)));
    }
    req.store.set_booking_status(id, BookingStatus::Cancelled)?;
    log::info!(
        "Booking {} cancelled by '{}' (was {})",
        id,
        user.username,
        booking.status
    );
    req.flash(Level::Success, "Booking cancelled");
    Ok(Response::Redirect(Route::BookingDetail(id)))
}

pub fn booking_set_status(req: &mut Request, id: BookingId, form: &StatusForm) -> HandlerResult {
    let user = req.require_staff(Route::BookingList)?;
    let booking = req.store.booking(id)?.ok_or(AppError::NotFound)?;
    let next = match form.status.trim().parse::<BookingStatus>() {
        Ok(BookingStatus::Cancelled) => {
            req.flash(Level::Error, "Use cancellation to cancel a booking");
            return Ok(Response::Redirect(Route::BookingDetail(id)));
        }
        Ok(status) => status,
        Err(unknown) => {
            req.flash(Level::Error, format!("Unknown booking status '{}'", unknown));
            return Ok(Response::Redirect(Route::BookingDetail(id)));
        }
    };
    if booking.status == next {
        req.flash(Level::Info, format!("Booking is already {}", next));
        return Ok(Response::Redirect(Route::BookingDetail(id)));
    }
    if !booking.status.can_become(next) {
        return Err(AppError::Forbidden {
            message: "Cancelled bookings cannot change status".to_string(),
            fallback: Route::BookingDetail(id),
        });
    }
    req.store.set_booking_status(id, next)?;
    log::info!(
        "Booking {} moved {} -> {} by '{}'",
        id,
        booking.status,
        next,
        user.username
    );
    req.flash(Level::Success, format!("Booking {}", next));
    Ok(Response::Redirect(Route::BookingDetail(id)))
}
