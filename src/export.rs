use crate::models::{Directory, EntityKind, User};

pub const USER_COLUMNS: [&str; 7] = [
    "Name",
    "Email",
    "Phone",
    "Role",
    "School",
    "Status",
    "Last Login",
];

/// Quotes a field when it contains a comma, quote or line break.
pub fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\r', '\n']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn csv_row<'a>(fields: impl IntoIterator<Item = &'a str>) -> String {
    fields
        .into_iter()
        .map(csv_field)
        .collect::<Vec<_>>()
        .join(",")
}

/// Users in the given order, one row each, with a header row.
pub fn users_csv(users: &[&User], directory: &dyn Directory) -> String {
    let mut out = csv_row(USER_COLUMNS);
    out.push_str("\r\n");

    for user in users {
        let school = user
            .school_id
            .as_deref()
            .map(|id| directory.resolve_name(EntityKind::Institution, id))
            .unwrap_or("");
        let status = if user.meta.is_active { "Active" } else { "Inactive" };
        let last_login = user
            .last_login
            .map(|at| at.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "Never".to_string());

        out.push_str(&csv_row([
            user.name.as_str(),
            user.email.as_str(),
            user.phone.as_deref().unwrap_or(""),
            user.role.label(),
            school,
            status,
            last_login.as_str(),
        ]));
        out.push_str("\r\n");
    }

    out
}
