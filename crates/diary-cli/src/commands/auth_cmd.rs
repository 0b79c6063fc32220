use diary_core::auth::AuthUser;

use crate::cli::AuthCommands;
use crate::context::AppContext;
use crate::error::CliError;
use crate::session::StoredSession;

pub fn run_auth(command: AuthCommands, ctx: &AppContext) -> Result<(), CliError> {
    let path = ctx.session_path();

    match command {
        AuthCommands::Login { user_id, email } => {
            let user = AuthUser::new(user_id, email)?;
            StoredSession::signed_in(user.clone())
                .save_to_path(&path)
                .map_err(CliError::Session)?;
            println!("Signed in as {user}");
            Ok(())
        }
        AuthCommands::Status => {
            match ctx.current_user()? {
                Some(user) => println!("Signed in as {user}"),
                None => println!("Not signed in."),
            }
            Ok(())
        }
        AuthCommands::Logout => {
            if StoredSession::clear_at_path(&path).map_err(CliError::Session)? {
                println!("Signed out");
            } else {
                println!("Not signed in.");
            }
            Ok(())
        }
    }
}
