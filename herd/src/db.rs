//! Metastore database provisioning on the manager's embedded PostgreSQL.

use crate::merge::MANAGER_DB_PORT;
use crate::remote::{ExecOptions, Remote};

pub const HIVE_DB_SCRIPT_PATH: &str = "/tmp/create_hive_db.sql";

/// File holding the embedded database's generated superuser password.
pub const MANAGER_DB_PASSWORD_FILE: &str =
    "/var/lib/cloudera-scm-server-db/data/generated_password.txt";

pub const HIVE_DB_USER: &str = "hive";
pub const HIVE_DB_NAME: &str = "metastore";

/// SQL creating the metastore role and database.
pub fn hive_db_script(password: &str) -> String {
    let password = password.replace('\'', "''");
    format!(
        "CREATE ROLE {HIVE_DB_USER} LOGIN PASSWORD '{password}';\n\
         CREATE DATABASE {HIVE_DB_NAME} OWNER {HIVE_DB_USER};\n"
    )
}

/// Create the metastore database; `remote` must be connected to the manager.
pub async fn create_hive_database(remote: &dyn Remote, password: &str) -> anyhow::Result<()> {
    remote
        .write_file_to(HIVE_DB_SCRIPT_PATH, &hive_db_script(password), false)
        .await?;
    let psql = format!(
        "PGPASSWORD=$(sudo head -1 {MANAGER_DB_PASSWORD_FILE}) \
         psql -U cloudera-scm -h localhost -p {MANAGER_DB_PORT} -d scm -f {HIVE_DB_SCRIPT_PATH}"
    );
    let outcome = remote.execute_command(&psql, ExecOptions::default()).await;
    // The script carries the password; remove it whether or not psql succeeded.
    remote
        .execute_command(&format!("rm {HIVE_DB_SCRIPT_PATH}"), ExecOptions::unchecked())
        .await?;
    outcome.map(|_| ())
}
