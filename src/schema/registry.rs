use super::column::{ColumnDefinition, SqlType};
use super::table::{IndexDefinition, OnDelete, TableDefinition};

/// Declared tables, in an order where every table follows the tables it references.
#[derive(Debug, Clone)]
pub struct SchemaRegistry {
    tables: Vec<TableDefinition>,
}

impl SchemaRegistry {
    pub fn new(tables: Vec<TableDefinition>) -> Self {
        Self { tables }
    }

    pub fn job_board() -> Self {
        Self::new(vec![
            users(),
            employer_profiles(),
            job_seeker_profiles(),
            education(),
            experience(),
            jobs(),
            applications(),
            saved_jobs(),
        ])
    }

    pub fn tables(&self) -> &[TableDefinition] {
        &self.tables
    }

    pub fn get(&self, name: &str) -> Option<&TableDefinition> {
        self.tables.iter().find(|t| t.name.eq_ignore_ascii_case(name))
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.tables.iter().position(|t| t.name.eq_ignore_ascii_case(name))
    }

    pub fn names(&self) -> Vec<&str> {
        self.tables.iter().map(|t| t.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

fn created_at() -> ColumnDefinition {
    ColumnDefinition::new("created_at", SqlType::Datetime)
        .not_null()
        .default_value("CURRENT_TIMESTAMP")
}

fn updated_at() -> ColumnDefinition {
    ColumnDefinition::new("updated_at", SqlType::Datetime)
        .not_null()
        .default_value("CURRENT_TIMESTAMP")
}

fn users() -> TableDefinition {
    TableDefinition::new("users")
        .column(ColumnDefinition::id())
        .column(ColumnDefinition::new("email", SqlType::Text).not_null().unique())
        .column(ColumnDefinition::new("password_hash", SqlType::Text).not_null())
        .column(ColumnDefinition::new("full_name", SqlType::Text))
        .column(
            ColumnDefinition::new("role", SqlType::Text)
                .not_null()
                .default_value("'job_seeker'"),
        )
        .column(created_at())
        .check("role IN ('employer', 'job_seeker', 'admin')")
        .index(IndexDefinition::new("idx_users_role", &["role"]))
}

fn employer_profiles() -> TableDefinition {
    TableDefinition::new("employer_profiles")
        .column(ColumnDefinition::id())
        .column(ColumnDefinition::new("user_id", SqlType::Integer).not_null().unique())
        .column(ColumnDefinition::new("company_name", SqlType::Text).not_null())
        .column(ColumnDefinition::new("company_website", SqlType::Text))
        .column(ColumnDefinition::new("company_size", SqlType::Text))
        .column(ColumnDefinition::new("industry", SqlType::Text))
        .column(ColumnDefinition::new("description", SqlType::Text))
        .column(ColumnDefinition::new("location", SqlType::Text))
        .column(created_at())
        .column(updated_at())
        .check("company_size IS NULL OR company_size IN ('1-10', '11-50', '51-200', '201-500', '500+')")
        .foreign_key("user_id", "users", OnDelete::Cascade)
        .index(IndexDefinition::new("idx_employer_profiles_industry", &["industry"]))
}

fn job_seeker_profiles() -> TableDefinition {
    TableDefinition::new("job_seeker_profiles")
        .column(ColumnDefinition::id())
        .column(ColumnDefinition::new("user_id", SqlType::Integer).not_null().unique())
        .column(ColumnDefinition::new("headline", SqlType::Text))
        .column(ColumnDefinition::new("summary", SqlType::Text))
        .column(ColumnDefinition::new("skills", SqlType::Text))
        .column(ColumnDefinition::new("location", SqlType::Text))
        .column(ColumnDefinition::new("resume_url", SqlType::Text))
        .column(
            ColumnDefinition::new("years_experience", SqlType::Integer)
                .not_null()
                .default_value("0"),
        )
        .column(created_at())
        .column(updated_at())
        .check("years_experience >= 0")
        .foreign_key("user_id", "users", OnDelete::Cascade)
        .index(IndexDefinition::new("idx_job_seeker_profiles_location", &["location"]))
}

fn education() -> TableDefinition {
    TableDefinition::new("education")
        .column(ColumnDefinition::id())
        .column(ColumnDefinition::new("profile_id", SqlType::Integer).not_null())
        .column(ColumnDefinition::new("institution", SqlType::Text).not_null())
        .column(ColumnDefinition::new("degree", SqlType::Text))
        .column(ColumnDefinition::new("field_of_study", SqlType::Text))
        .column(ColumnDefinition::new("start_date", SqlType::Text))
        .column(ColumnDefinition::new("end_date", SqlType::Text))
        .check("end_date IS NULL OR start_date IS NULL OR end_date >= start_date")
        .foreign_key("profile_id", "job_seeker_profiles", OnDelete::Cascade)
        .index(IndexDefinition::new("idx_education_profile_id", &["profile_id"]))
}

fn experience() -> TableDefinition {
    TableDefinition::new("experience")
        .column(ColumnDefinition::id())
        .column(ColumnDefinition::new("profile_id", SqlType::Integer).not_null())
        .column(ColumnDefinition::new("company", SqlType::Text).not_null())
        .column(ColumnDefinition::new("title", SqlType::Text).not_null())
        .column(ColumnDefinition::new("start_date", SqlType::Text))
        .column(ColumnDefinition::new("end_date", SqlType::Text))
        .column(
            ColumnDefinition::new("is_current", SqlType::Integer)
                .not_null()
                .default_value("0"),
        )
        .column(ColumnDefinition::new("description", SqlType::Text))
        .check("is_current IN (0, 1)")
        .foreign_key("profile_id", "job_seeker_profiles", OnDelete::Cascade)
        .index(IndexDefinition::new("idx_experience_profile_id", &["profile_id"]))
}

fn jobs() -> TableDefinition {
    TableDefinition::new("jobs")
        .column(ColumnDefinition::id())
        .column(ColumnDefinition::new("employer_id", SqlType::Integer).not_null())
        .column(ColumnDefinition::new("title", SqlType::Text).not_null())
        .column(ColumnDefinition::new("description", SqlType::Text).not_null())
        .column(ColumnDefinition::new("location", SqlType::Text))
        .column(
            ColumnDefinition::new("employment_type", SqlType::Text)
                .not_null()
                .default_value("'full_time'"),
        )
        .column(ColumnDefinition::new("salary_min", SqlType::Integer))
        .column(ColumnDefinition::new("salary_max", SqlType::Integer))
        .column(
            ColumnDefinition::new("status", SqlType::Text)
                .not_null()
                .default_value("'open'"),
        )
        .column(created_at())
        .column(updated_at())
        .check("employment_type IN ('full_time', 'part_time', 'contract', 'internship', 'temporary')")
        .check("salary_min IS NULL OR salary_max IS NULL OR salary_min <= salary_max")
        .check("status IN ('open', 'closed', 'draft')")
        .foreign_key("employer_id", "users", OnDelete::Cascade)
        .index(IndexDefinition::new("idx_jobs_employer_id", &["employer_id"]))
        .index(IndexDefinition::new("idx_jobs_status", &["status"]))
        .index(IndexDefinition::new("idx_jobs_created_at", &["created_at"]))
}

fn applications() -> TableDefinition {
    TableDefinition::new("applications")
        .column(ColumnDefinition::id())
        .column(ColumnDefinition::new("job_id", SqlType::Integer).not_null())
        .column(ColumnDefinition::new("user_id", SqlType::Integer).not_null())
        .column(ColumnDefinition::new("cover_letter", SqlType::Text))
        .column(
            ColumnDefinition::new("status", SqlType::Text)
                .not_null()
                .default_value("'pending'"),
        )
        .column(
            ColumnDefinition::new("applied_at", SqlType::Datetime)
                .not_null()
                .default_value("CURRENT_TIMESTAMP"),
        )
        .check("status IN ('pending', 'reviewed', 'accepted', 'rejected')")
        .unique(&["job_id", "user_id"])
        .foreign_key("job_id", "jobs", OnDelete::Cascade)
        .foreign_key("user_id", "users", OnDelete::Cascade)
        .index(IndexDefinition::new("idx_applications_job_id", &["job_id"]))
        .index(IndexDefinition::new("idx_applications_user_id", &["user_id"]))
}

fn saved_jobs() -> TableDefinition {
    TableDefinition::new("saved_jobs")
        .column(ColumnDefinition::id())
        .column(ColumnDefinition::new("job_id", SqlType::Integer).not_null())
        .column(ColumnDefinition::new("user_id", SqlType::Integer).not_null())
        .column(
            ColumnDefinition::new("saved_at", SqlType::Datetime)
                .not_null()
                .default_value("CURRENT_TIMESTAMP"),
        )
        .unique(&["job_id", "user_id"])
        .foreign_key("job_id", "jobs", OnDelete::Cascade)
        .foreign_key("user_id", "users", OnDelete::Cascade)
        .index(IndexDefinition::new("idx_saved_jobs_user_id", &["user_id"]))
}
