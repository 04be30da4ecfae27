use crate::auth::{ensure_admin_user, AdminAccount};
use crate::error::{BankError, BankResult};
use crate::excel::{ExcelExporter, ExcelImporter, ExportScope};
use crate::import::{check_upload_name, import_sheet};
use crate::store::Store;
use colored::Colorize;
use std::fs;
use std::path::PathBuf;

/// Execute the init command
pub fn init(db: PathBuf, admin_password: String, password_cost: u32) -> BankResult<()> {
    println!("{}", "📚 Quizbank - Init".bold().green());
    println!("   Database: {}\n", db.display());

    let mut store = Store::open(&db)?;
    let admin = AdminAccount {
        password: admin_password,
        ..AdminAccount::default()
    };

    if ensure_admin_user(&mut store, &admin, password_cost)? {
        println!(
            "{}",
            format!("✅ Created admin account '{}'", admin.username)
                .bold()
                .green()
        );
    } else {
        println!(
            "{}",
            format!("✓ Admin account '{}' already exists", admin.username).cyan()
        );
    }
    println!();

    Ok(())
}

/// Execute the import command
pub fn import(db: PathBuf, file: PathBuf, user: Option<String>) -> BankResult<()> {
    println!("{}", "📚 Quizbank - Excel Import".bold().green());
    println!("   Input:    {}", file.display());
    println!("   Database: {}\n", db.display());

    check_upload_name(file.file_name().and_then(|name| name.to_str()))?;

    let mut store = Store::open(&db)?;
    let created_by_id = match user {
        Some(username) => Some(
            store
                .find_user_by_username(&username)?
                .ok_or_else(|| BankError::not_found(format!("User '{}'", username)))?
                .id,
        ),
        None => None,
    };

    let sheet = ExcelImporter::open(&file)?.read_sheet()?;
    println!("   Found {} rows\n", sheet.len());

    let report = import_sheet(&mut store, &sheet, created_by_id)?;

    if report.success_count > 0 {
        println!("{}", format!("✅ {}", report.summary()).bold().green());
    } else {
        println!("{}", format!("⚠️  {}", report.summary()).bold().yellow());
    }
    for line in report.error_messages() {
        println!("   {}", line.red());
    }
    println!();

    Ok(())
}

/// Execute the export command
pub fn export(db: PathBuf, dir: PathBuf, paper: Option<i64>, ids: Option<String>) -> BankResult<()> {
    println!("{}", "📚 Quizbank - Excel Export".bold().green());
    println!("   Database: {}", db.display());

    let store = Store::open(&db)?;
    let scope = ExportScope::from_params(paper, ids.as_deref())?;
    let questions = scope.load(&store)?;

    fs::create_dir_all(&dir)?;
    let output = dir.join(scope.filename());
    ExcelExporter::questions(&questions).save(&output)?;

    println!("   Output:   {}\n", output.display());
    println!(
        "{}",
        format!("✅ Exported {} questions", questions.len())
            .bold()
            .green()
    );
    println!();

    Ok(())
}

/// Execute the template command
pub fn template(output: PathBuf) -> BankResult<()> {
    println!("{}", "📚 Quizbank - Import Template".bold().green());

    ExcelExporter::template().save(&output)?;

    println!("{}", "✅ Template written".bold().green());
    println!("   Excel file: {}\n", output.display());

    Ok(())
}

/// Execute the stats command
pub fn stats(db: PathBuf) -> BankResult<()> {
    println!("{}", "📚 Quizbank - Statistics".bold().green());
    println!("   Database: {}\n", db.display());

    let store = Store::open(&db)?;
    println!("   Questions: {}", store.count_questions()?.to_string().bold());
    println!("   Papers:    {}", store.count_papers()?.to_string().bold());
    println!("   Users:     {}", store.count_users()?.to_string().bold());
    println!();

    Ok(())
}

#[cfg(test)]
#[path = "commands_tests.rs"]
mod tests;
