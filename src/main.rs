mod config;
mod controller;
mod db;
mod device;
mod error;
mod history;
mod model;
mod photo;
mod remote;
mod repository;
mod resource;
mod search;

use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Result};
use clap::{Args, Parser, Subcommand};
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

use config::Config;
use controller::add::{AddContactController, AddContactEvent};
use controller::detail::{DetailController, DetailState};
use controller::list::{ContactsController, ContactsEvent, ListState};
use db::{Database, SharedDatabase};
use device::{SavedFlags, VcardBook};
use history::SearchHistory;
use model::Contact;
use remote::http::HttpGateway;
use repository::Repository;

#[derive(Parser, Debug)]
#[command(name = "phonebook", version, about = "Phone-book REST client")]
struct Cli {
    /// Configuration file (default: <config dir>/phonebook/config.toml)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Server root, overriding `base_url` from the configuration
    #[arg(long, global = true, value_name = "URL")]
    base_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List every contact on the server
    List,
    /// Search contacts by name or phone number
    Search { query: String },
    /// Show a single contact
    Show { id: String },
    /// Create a contact
    Add(AddArgs),
    /// Change fields of an existing contact
    Edit(EditArgs),
    /// Delete a contact
    Delete { id: String },
    /// Inspect or prune the search history
    #[command(subcommand)]
    History(HistoryCommand),
    /// Copy a contact into the device address book
    SaveToDevice { id: String },
    /// Forget that a contact was copied to the device
    ForgetDevice { id: String },
}

#[derive(Args, Debug)]
struct AddArgs {
    #[arg(long, default_value = "")]
    first_name: String,
    #[arg(long, default_value = "")]
    last_name: String,
    #[arg(long, default_value = "")]
    phone: String,
    /// Photo to upload with the contact
    #[arg(long, value_name = "PATH")]
    photo: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct EditArgs {
    id: String,
    #[arg(long)]
    first_name: Option<String>,
    #[arg(long)]
    last_name: Option<String>,
    #[arg(long)]
    phone: Option<String>,
    #[arg(long, value_name = "PATH", conflicts_with = "clear_photo")]
    photo: Option<PathBuf>,
    #[arg(long, default_value_t = false)]
    clear_photo: bool,
}

#[derive(Subcommand, Debug)]
enum HistoryCommand {
    List,
    Remove { query: String },
    Clear,
}

/// Shared wiring for every command.
struct Services {
    config: Config,
    db: SharedDatabase,
}

impl Services {
    fn open(config: Config) -> Result<Self> {
        let db = db::shared(Database::open(&config.data_dir)?);
        Ok(Self { config, db })
    }

    fn repository(&self) -> Result<Repository> {
        let gateway = HttpGateway::new(&self.config.base_url)?;
        Ok(Repository::new(Arc::new(gateway)))
    }

    fn history(&self) -> SearchHistory {
        SearchHistory::new(self.db.clone(), self.config.search.history_limit)
    }

    fn contacts(&self) -> Result<ContactsController> {
        Ok(ContactsController::new(
            self.repository()?,
            self.history(),
            self.config.search.debounce,
        ))
    }

    fn detail(&self) -> Result<DetailController> {
        let book = VcardBook::new(self.config.device.vdir.clone());
        Ok(DetailController::new(
            self.repository()?,
            SavedFlags::new(self.db.clone()),
            Arc::new(book),
        ))
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let config = config::load(cli.config.as_deref(), cli.base_url.as_deref())?;
    debug!(path = %config.config_path.display(), base_url = %config.base_url, "configuration loaded");

    let services = Services::open(config)?;
    match cli.command {
        Command::List => handle_list(&services).await,
        Command::Search { query } => handle_search(&services, query).await,
        Command::Show { id } => handle_show(&services, &id).await,
        Command::Add(args) => handle_add(&services, args).await,
        Command::Edit(args) => handle_edit(&services, args).await,
        Command::Delete { id } => handle_delete(&services, id).await,
        Command::History(command) => handle_history(&services, command),
        Command::SaveToDevice { id } => handle_save_to_device(&services, &id).await,
        Command::ForgetDevice { id } => handle_forget_device(&services, &id).await,
    }
}

fn print_contacts(contacts: &[Contact]) {
    if contacts.is_empty() {
        println!("No contacts");
        return;
    }
    for contact in contacts {
        println!(
            "{:<3} {:<30} {:<18} {}",
            contact.initials(),
            contact.full_name().trim(),
            contact.phone_number,
            contact.id
        );
    }
}

fn print_contact(contact: &Contact, saved_to_device: bool) {
    println!("id:         {}", contact.id);
    println!("first name: {}", contact.first_name);
    println!("last name:  {}", contact.last_name);
    println!("phone:      {}", contact.phone_number);
    println!("photo:      {}", contact.image_url.as_deref().unwrap_or("-"));
    println!("on device:  {}", if saved_to_device { "yes" } else { "no" });
}

fn check_list(state: ListState) -> Result<ListState> {
    match state.error {
        Some(err) if err.is_transport() => {
            Err(anyhow::Error::new(err).context("could not reach the phone-book server"))
        }
        Some(err) => bail!(err),
        None => Ok(state),
    }
}

async fn handle_list(services: &Services) -> Result<()> {
    let controller = services.contacts()?;
    let state = check_list(controller.settle().await)?;
    print_contacts(&state.contacts);
    Ok(())
}

async fn handle_search(services: &Services, query: String) -> Result<()> {
    let controller = services.contacts()?;
    controller.dispatch(ContactsEvent::SearchQuery(query.clone()));
    let state = check_list(controller.settle().await)?;
    if state.contacts.is_empty() {
        println!("No matches for \"{}\"", query);
        return Ok(());
    }
    print_contacts(&state.contacts);
    Ok(())
}

async fn handle_delete(services: &Services, id: String) -> Result<()> {
    let controller = services.contacts()?;
    check_list(controller.settle().await)?;
    controller.dispatch(ContactsEvent::DeleteContact(id.clone()));
    let state = check_list(controller.settle().await)?;
    println!("Deleted {} ({} contacts left)", id, state.contacts.len());
    Ok(())
}

/// Load `id` into a fresh detail controller, failing if the load failed.
async fn load_detail(services: &Services, id: &str, edit: bool) -> Result<(DetailController, DetailState)> {
    let controller = services.detail()?;
    controller.initialize(id, edit).await;
    let state = controller.state();
    if let Some(err) = state.error {
        bail!(err);
    }
    Ok((controller, state))
}

async fn handle_show(services: &Services, id: &str) -> Result<()> {
    let (_, state) = load_detail(services, id, false).await?;
    if let Some(contact) = &state.contact {
        print_contact(contact, state.saved_to_device);
    }
    Ok(())
}

async fn handle_add(services: &Services, args: AddArgs) -> Result<()> {
    let controller = AddContactController::new(services.repository()?);
    controller.on_event(AddContactEvent::FirstNameChanged(args.first_name));
    controller.on_event(AddContactEvent::LastNameChanged(args.last_name));
    controller.on_event(AddContactEvent::PhoneNumberChanged(args.phone));

    if let Some(path) = &args.photo {
        let bytes = photo::prepare_upload(path)?;
        // a failed upload leaves the rest of the form usable
        if let Err(err) = controller.select_image(bytes).await {
            warn!("photo upload failed, saving contact without it: {err}");
            controller.on_event(AddContactEvent::DismissError);
        }
    }

    let contact = controller.save().await?;
    println!("Created {} ({})", contact.full_name().trim(), contact.id);
    Ok(())
}

async fn handle_edit(services: &Services, args: EditArgs) -> Result<()> {
    let (controller, _) = load_detail(services, &args.id, true).await?;
    if let Some(value) = args.first_name {
        controller.set_first_name(value);
    }
    if let Some(value) = args.last_name {
        controller.set_last_name(value);
    }
    if let Some(value) = args.phone {
        controller.set_phone_number(value);
    }
    if args.clear_photo {
        controller.set_image_url("");
    }
    if let Some(path) = &args.photo {
        let bytes = photo::prepare_upload(path)?;
        controller.upload_image(bytes).await?;
    }

    let contact = controller.save().await?;
    print_contact(&contact, controller.state().saved_to_device);
    Ok(())
}

fn handle_history(services: &Services, command: HistoryCommand) -> Result<()> {
    let history = services.history();
    match command {
        HistoryCommand::List => {
            for query in history.get_all() {
                println!("{}", query);
            }
        }
        HistoryCommand::Remove { query } => history.remove(&query)?,
        HistoryCommand::Clear => history.clear()?,
    }
    Ok(())
}

async fn handle_save_to_device(services: &Services, id: &str) -> Result<()> {
    let (controller, state) = load_detail(services, id, false).await?;
    if state.saved_to_device {
        println!("{} is already on the device", id);
        return Ok(());
    }
    controller.save_to_device()?;
    println!("Saved {} to {}", id, services.config.device.vdir.display());
    Ok(())
}

async fn handle_forget_device(services: &Services, id: &str) -> Result<()> {
    let (controller, _) = load_detail(services, id, false).await?;
    controller.forget_device_copy()?;
    println!("Forgot device copy of {}", id);
    Ok(())
}
