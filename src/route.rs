use serde::Serialize;

use crate::apartment::ApartmentId;
use crate::booking::BookingId;

/// Canonical redirect targets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Route {
    Home,
    ApartmentList,
    ApartmentDetail(ApartmentId),
    FavoritesList,
    BookingList,
    BookingDetail(BookingId),
    Login { next: String },
}

impl Route {
    pub fn url(&self, login_url: &str) -> String {
        match self {
            Route::Home => "/".to_string(),
            Route::ApartmentList => "/apartments/list/".to_string(),
            Route::ApartmentDetail(id) => format!("/apartments/{}/", id),
            Route::FavoritesList => "/apartments/favorites/".to_string(),
            Route::BookingList => "/apartments/bookings/".to_string(),
            Route::BookingDetail(id) => format!("/apartments/bookings/{}/", id),
            Route::Login { next } => match serde_urlencoded::to_string([("next", next)]) {
                Ok(query) => format!("{}?{}", login_url, query),
                Err(e) => {
                    log::warn!("Fail to encode login redirect for '{}': {}", next, e);
                    login_url.to_string()
                }
            },
        }
    }
}

/// Templates handed to the presentation collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum View {
    Home,
    ApartmentList,
    ApartmentDetail,
    ApartmentForm,
    ApartmentConfirmDelete,
    FavoritesList,
    BookingForm,
    BookingList,
    BookingDetail,
    BookingConfirmCancel,
}

impl View {
    pub fn template(&self) -> &'static str {
        match self {
            View::Home => "Home/index.html",
            View::ApartmentList => "apartments/apartment_list.html",
            View::ApartmentDetail => "apartments/apartment_detail.html",
            View::ApartmentForm => "apartments/apartment_form.html",
            View::ApartmentConfirmDelete => "apartments/apartment_confirm_delete.html",
            View::FavoritesList => "apartments/favorites_list.html",
            View::BookingForm => "apartments/booking_form.html",
            View::BookingList => "apartments/booking_list.html",
            View::BookingDetail => "apartments/booking_detail.html",
            View::BookingConfirmCancel => "apartments/booking_confirm_cancel.html",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urls_follow_site_layout() {
        assert_eq!(Route::ApartmentDetail(7).url("/login/"), "/apartments/7/");
        assert_eq!(
            Route::BookingDetail(3).url("/login/"),
            "/apartments/bookings/3/"
        );
        assert_eq!(Route::Home.url("/login/"), "/");
    }

    #[test]
    fn login_carries_escaped_next() {
        let route = Route::Login {
            next: "/apartments/1/book/?a=b".into(),
        };
        assert_eq!(
            route.url("/accounts/login/"),
            "/accounts/login/?next=%2Fapartments%2F1%2Fbook%2F%3Fa%3Db"
        );
    }
}
