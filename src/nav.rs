//! Sidebar navigation entries.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Icon {
    Analytics,
    User,
    Lock,
}

impl Icon {
    /// Asset name of the icon, as shipped under `assets/icons/navbar/`.
    pub fn reference(&self) -> &'static str {
        match self {
            Icon::Analytics => "ic-analytics",
            Icon::User => "ic-user",
            Icon::Lock => "ic-lock",
        }
    }

    pub fn glyph(&self) -> &'static str {
        match self {
            Icon::Analytics => "◔",
            Icon::User => "☰",
            Icon::Lock => "⚿",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NavEntry {
    pub title: &'static str,
    pub path: &'static str,
    pub icon: Icon,
}

pub static NAV_DATA: &[NavEntry] = &[
    NavEntry {
        title: "Статистика",
        path: "/",
        icon: Icon::Analytics,
    },
    NavEntry {
        title: "Таблицы",
        path: "/user",
        icon: Icon::User,
    },
    NavEntry {
        title: "Вход",
        path: "/sign-in",
        icon: Icon::Lock,
    },
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Overview,
    Tables,
    SignIn,
}

impl Route {
    pub fn from_path(path: &str) -> Option<Route> {
        match path {
            "/" => Some(Route::Overview),
            "/user" => Some(Route::Tables),
            "/sign-in" => Some(Route::SignIn),
            _ => None,
        }
    }

    /// Position of the route's entry in [`NAV_DATA`].
    pub fn nav_index(&self) -> usize {
        NAV_DATA
            .iter()
            .position(|e| Route::from_path(e.path) == Some(*self))
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_entry_resolves_to_a_route() {
        for (idx, entry) in NAV_DATA.iter().enumerate() {
            let route = Route::from_path(entry.path).expect("unknown path");
            assert_eq!(route.nav_index(), idx);
        }
    }

    #[test]
    fn entries_keep_their_order() {
        let paths: Vec<&str> = NAV_DATA.iter().map(|e| e.path).collect();
        assert_eq!(paths, vec!["/", "/user", "/sign-in"]);
        assert_eq!(NAV_DATA[0].icon.reference(), "ic-analytics");
        assert_eq!(NAV_DATA[2].icon.reference(), "ic-lock");
    }
}
