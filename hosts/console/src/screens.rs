use std::{path::Path, sync::Arc, time::Duration};

use anyhow::{anyhow, bail, Context, Result};
use chrono::{NaiveDate, Utc};
use cqrs_es::DomainEvent;
use farmacia_client::HttpBackend;
use farmacia_domain::{
    inventory::{coverage_percent, parse_cpm, CpmUpdate, LotEdit, StockAlert},
    ports::{BulkUploadGateway, InventoryMaintenance, PatientDirectory, ReportGateway},
    report::{ReportFormat, ReportRequest},
    search::{SearchBox, Suggestions, DEBOUNCE, MIN_QUERY_CHARS},
    workflows::{
        bulk_upload::{read_rows, template_csv, TEMPLATE_FILE_NAME},
        dispense::{normalize_curp, CURP_LEN},
        BulkUpload, BulkUploadResults, Dispense, DispenseHeader, Entry, EntryHeader, EntryInput,
        UploadFile, Workflow,
    },
    CartSession, Error, RejectReason, StagingCart,
};
use rust_decimal::Decimal;

use crate::{
    commands::{ConsoleCommand, ReportKind},
    render,
};

/// A cart session plus the form fields around it.
pub struct Screen<W: Workflow> {
    session: CartSession<W>,
    header: W::Header,
    backend: Arc<HttpBackend>,
    timeout: Duration,
}

/// Spreadsheet upload: rows are previewed in a cart, the sheet is the commit.
pub struct BulkScreen {
    session: CartSession<BulkUpload>,
    backend: Arc<HttpBackend>,
}

/// The workflow picked at startup.
pub enum AnyScreen {
    Entry(Screen<Entry>, SearchBox<HttpBackend>),
    Dispense(Screen<Dispense>),
    Bulk(BulkScreen),
}

impl AnyScreen {
    pub fn entry(backend: Arc<HttpBackend>, timeout: Duration) -> Self {
        let header = EntryHeader {
            fecha: Utc::now().date_naive(),
            ..Default::default()
        };
        let search = SearchBox::new(backend.clone());
        AnyScreen::Entry(Screen::new(backend, timeout, header), search)
    }

    pub fn dispense(backend: Arc<HttpBackend>, timeout: Duration) -> Self {
        let header = DispenseHeader {
            paciente_curp: String::new(),
            paciente_nombre: String::new(),
            paciente_nacimiento: Utc::now().date_naive(),
            receta_origen: String::new(),
            receta_folio: String::new(),
        };
        AnyScreen::Dispense(Screen::new(backend, timeout, header))
    }

    pub fn bulk(backend: Arc<HttpBackend>, timeout: Duration) -> Self {
        // Previews can stage hundreds of rows, so no per-event rendering.
        let session = CartSession::new(StagingCart::<BulkUpload>::new()).with_timeout(timeout);
        AnyScreen::Bulk(BulkScreen { session, backend })
    }

    pub async fn run(&mut self, command: ConsoleCommand) -> Result<()> {
        match self {
            AnyScreen::Entry(screen, search) => screen.run_entry(search, command).await,
            AnyScreen::Dispense(screen) => screen.run_dispense(command).await,
            AnyScreen::Bulk(screen) => screen.run(command).await,
        }
    }
}

/// Commands every cart understands. Returns the command back when it
/// belongs to a specific screen.
async fn run_cart<W: Workflow>(
    session: &mut CartSession<W>,
    command: ConsoleCommand,
) -> Result<Option<ConsoleCommand>> {
    match command {
        ConsoleCommand::List => println!("{}", render::table(&session.cart().view())),
        ConsoleCommand::Total => println!("Total: {}", session.cart().total().round_dp(2)),
        ConsoleCommand::Remove { position } => session.cart_mut().remove_at(position - 1).await?,
        ConsoleCommand::Clear => session.abandon().await?,
        ConsoleCommand::History => {
            for entry in session.cart().journal().await? {
                println!(
                    "{:>3} {} v{} at {} {}",
                    entry.sequence,
                    entry.payload.event_type(),
                    entry.payload.event_version(),
                    entry.metadata.get("recorded_at").map(String::as_str).unwrap_or("-"),
                    serde_json::to_string(&entry.payload)?
                );
            }
        }
        other => return Ok(Some(other)),
    }
    Ok(None)
}

impl<W: Workflow> Screen<W> {
    fn new(backend: Arc<HttpBackend>, timeout: Duration, header: W::Header) -> Self {
        let cart = StagingCart::<W>::new().with_renderer(render::print_event::<W::Detail>);
        Self {
            session: CartSession::new(cart).with_timeout(timeout),
            header,
            backend,
            timeout,
        }
    }

    async fn run_common(&mut self, command: ConsoleCommand) -> Result<Option<ConsoleCommand>> {
        match run_cart(&mut self.session, command).await? {
            Some(ConsoleCommand::Header) => println!("{:#?}", self.header),
            other => return Ok(other),
        }
        Ok(None)
    }
}

impl Screen<Entry> {
    async fn run_entry(&mut self, search: &mut SearchBox<HttpBackend>, command: ConsoleCommand) -> Result<()> {
        match command {
            ConsoleCommand::Search { query } => return self.search(search, &query.join(" ")).await,
            ConsoleCommand::Suggestions => {
                search.focus();
                print_suggestions(&search.suggestions());
                return Ok(());
            }
            ConsoleCommand::Pick { position } => {
                let hit = search
                    .select(position - 1)
                    .ok_or_else(|| anyhow!("No suggestion {}", position))?;
                println!("Selected {} - {}", hit.clave, hit.descripcion);
                self.session.cart_mut().set_lookup(hit)?;
                return Ok(());
            }
            // Anything else moves focus away from the search field.
            _ => search.blur(),
        }

        let command = match self.run_common(command).await? {
            Some(command) => command,
            None => return Ok(()),
        };

        match command {
            ConsoleCommand::Add { quantity, fields } => {
                let quantity = parse_quantity(&quantity)?;
                let input = entry_input(&fields)?;
                self.session.cart_mut().add(quantity, input).await?;
            }
            ConsoleCommand::Set { field, value } => {
                set_entry_field(&mut self.header, &field.to_lowercase(), value.join(" "))?
            }
            ConsoleCommand::Commit => {
                let receipt = self.session.commit(self.backend.as_ref(), &self.header).await?;
                println!("Entry {} saved", receipt.folio);
                if let Some(url) = receipt.redirect_url {
                    println!("Continue at {}", url);
                }
                self.header.folio.clear();
            }
            ConsoleCommand::Report { format } => {
                let format = match format {
                    ReportKind::Pdf => ReportFormat::Pdf,
                    ReportKind::Xlsx => ReportFormat::Xlsx,
                };
                self.header.ensure_folio();
                let request = ReportRequest::for_entry(self.session.cart(), &self.header)?;
                let bytes = self.backend.generate_report(format, &request).await?;
                let file_name = format.file_name(&request.folio);
                tokio::fs::write(&file_name, bytes)
                    .await
                    .with_context(|| format!("writing {}", file_name))?;
                println!("Report written to {}", file_name);
            }
            ConsoleCommand::Cpm { value, stock } => {
                let hit = self
                    .session
                    .cart()
                    .lookup()
                    .cloned()
                    .ok_or(RejectReason::NoActiveLookup)?;
                let cpm = parse_cpm(&value)?;

                let stored = self.backend.update_cpm(&CpmUpdate::new(hit.id, cpm)).await?;
                println!("CPM of {} is now {}", hit.clave, stored);
                if let Some(stock) = stock {
                    println!("{}", alert_line(stock, stored));
                }
            }
            other => bail!("{:?} is not available on the entry screen", other),
        }
        Ok(())
    }

    /// Typed query: debounced like a keystroke, then wait for the list.
    async fn search(&mut self, search: &mut SearchBox<HttpBackend>, query: &str) -> Result<()> {
        let mut updates = search.subscribe();
        updates.borrow_and_update();
        search.input(query);

        match tokio::time::timeout(DEBOUNCE + self.timeout, updates.changed()).await {
            Ok(Ok(())) => {}
            Ok(Err(_)) => bail!("search is no longer running"),
            Err(_) => return Err(Error::RequestTimedOut.into()),
        }

        let suggestions = search.suggestions();
        if suggestions == Suggestions::Hidden && query.trim().chars().count() < MIN_QUERY_CHARS {
            println!("Type at least {} characters", MIN_QUERY_CHARS);
        } else {
            print_suggestions(&suggestions);
        }
        Ok(())
    }
}

fn print_suggestions(suggestions: &Suggestions) {
    match suggestions {
        Suggestions::Results(hits) => {
            for (i, hit) in hits.iter().enumerate() {
                println!("{:>3}. {} - {} ({})", i + 1, hit.clave, hit.descripcion, hit.presentacion_label());
            }
        }
        Suggestions::NotFound => println!("No medications found"),
        Suggestions::Hidden => println!("No suggestions"),
    }
}

fn alert_line(stock: u64, cpm: u64) -> String {
    let level = StockAlert::classify(stock, cpm);
    match coverage_percent(stock, cpm) {
        Some(percent) => format!("Stock {} is {:.1}% of CPM: {}", stock, percent, level),
        None => format!("Stock {} with no CPM: {}", stock, level),
    }
}

impl Screen<Dispense> {
    async fn run_dispense(&mut self, command: ConsoleCommand) -> Result<()> {
        let command = match self.run_common(command).await? {
            Some(command) => command,
            None => return Ok(()),
        };

        match command {
            ConsoleCommand::Scan { code } => {
                let lot = self.session.scan(self.backend.as_ref(), &code).await?;
                println!(
                    "{} lot {} expires {} stock {}",
                    lot.medicamento_nombre, lot.lote_numero, lot.caducidad, lot.cantidad_actual
                );
            }
            ConsoleCommand::Patient { query } => {
                let query = query.join(" ");
                let curp = normalize_curp(&query);
                let found = if curp.len() == CURP_LEN && !curp.contains(' ') {
                    self.backend.patient_by_curp(&curp).await
                } else {
                    self.backend.patient_by_name(&query).await
                };

                match found {
                    Ok(patient) => {
                        self.header.fill_from(&patient);
                        println!("Patient {} born {}", patient.nombre_completo, patient.fecha_nacimiento);
                    }
                    Err(Error::LookupNotFound { message }) => {
                        if curp.len() == CURP_LEN {
                            self.header.paciente_curp = curp;
                        }
                        println!("{}: new patient, fill in the fields with set", message);
                    }
                    Err(e) => return Err(e.into()),
                }
            }
            ConsoleCommand::Add { quantity, .. } => {
                let quantity = parse_quantity(&quantity)?;
                self.session.cart_mut().add(quantity, ()).await?;
            }
            ConsoleCommand::Set { field, value } => {
                set_dispense_field(&mut self.header, &field.to_lowercase(), value.join(" "))?
            }
            ConsoleCommand::Lot { changes } => {
                let lot = self
                    .session
                    .cart()
                    .lookup()
                    .cloned()
                    .ok_or(RejectReason::NoActiveLookup)?;
                let edit = lot_edit(&changes)?;

                let mensaje = self.backend.edit_lot(&lot.id, &edit).await?;
                println!("{}", mensaje);
                // The scanned record is stale now; scan again to add it.
                self.session.cart_mut().clear_lookup();
            }
            ConsoleCommand::Commit => {
                let receipt = self.session.commit(self.backend.as_ref(), &self.header).await?;
                println!("{}", receipt.message.as_deref().unwrap_or("Dispense registered"));
                println!("Receipt: {}{}", self.backend.base_url().trim_end_matches('/'), receipt.pdf_url);
            }
            other => bail!("{:?} is not available on the dispense screen", other),
        }
        Ok(())
    }
}

impl BulkScreen {
    async fn run(&mut self, command: ConsoleCommand) -> Result<()> {
        let command = match run_cart(&mut self.session, command).await? {
            Some(command) => command,
            None => return Ok(()),
        };

        match command {
            ConsoleCommand::Preview { path } => {
                let bytes = tokio::fs::read(&path)
                    .await
                    .with_context(|| format!("reading {}", path))?;
                let rows = read_rows(bytes.as_slice())?;
                let count = rows.len();

                let refused = self.session.cart_mut().stage_rows(rows).await?;
                for (row, reason) in &refused {
                    println!("Row {} ({}): {}", row.fila, row.clave, reason);
                }
                println!("{}", render::table(&self.session.cart().view()));
                println!("{} of {} rows staged", count - refused.len(), count);
            }
            ConsoleCommand::Upload { path } => {
                let file = upload_file(&path).await?;
                // Without a preview the sheet goes straight to the backend.
                let results = if self.session.cart().is_empty() {
                    self.backend.upload(&file).await?
                } else {
                    self.session.commit(self.backend.as_ref(), &file).await?
                };
                print_results(&results);
            }
            ConsoleCommand::Template => {
                tokio::fs::write(TEMPLATE_FILE_NAME, template_csv())
                    .await
                    .with_context(|| format!("writing {}", TEMPLATE_FILE_NAME))?;
                println!("Template written to {}", TEMPLATE_FILE_NAME);
            }
            other => bail!("{:?} is not available on the upload screen", other),
        }
        Ok(())
    }
}

async fn upload_file(path: &str) -> Result<UploadFile> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("reading {}", path))?;
    let file_name = Path::new(path)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(path);
    Ok(UploadFile::new(file_name, bytes)?)
}

fn print_results(results: &BulkUploadResults) {
    println!(
        "Rows: {}  created: {}  updated: {}  errors: {}  warnings: {}",
        results.total,
        results.exitosos,
        results.actualizados,
        results.errores.len(),
        results.advertencias.len()
    );
    for row in results.rows() {
        println!("[{}] {}: {}", row.kind, row.label, row.message);
    }
}

fn parse_quantity(raw: &str) -> Result<i64> {
    raw.parse::<i64>()
        .map_err(|_| anyhow!(RejectReason::InvalidQuantity))
}

fn parse_date(raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").with_context(|| format!("{} is not a YYYY-MM-DD date", raw))
}

/// `<lote> <caducidad> <precio> <presentacion_id> [presentacion]`
fn entry_input(fields: &[String]) -> Result<EntryInput> {
    let [lote, caducidad, precio, presentacion_id, rest @ ..] = fields else {
        bail!("Usage: add <qty> <lote> <caducidad> <precio> <presentacion_id> [presentacion]");
    };

    let precio_unitario = precio
        .parse::<Decimal>()
        .map_err(|_| anyhow!(RejectReason::InvalidPrice))?;

    Ok(EntryInput {
        presentacion_id: presentacion_id.clone(),
        presentacion: if rest.is_empty() {
            "UNIDAD".to_string()
        } else {
            rest.join(" ")
        },
        lote: lote.clone(),
        caducidad: parse_date(caducidad)?,
        precio_unitario: Some(precio_unitario),
    })
}

/// `field=value` pairs of the `lot` command.
fn lot_edit(changes: &[String]) -> Result<LotEdit> {
    let mut edit = LotEdit::new();

    for change in changes {
        let (field, value) = change
            .split_once('=')
            .ok_or_else(|| anyhow!("{} is not field=value", change))?;

        match field.to_lowercase().as_str() {
            "codigo" | "lote_codigo" => edit.lote_codigo = Some(value.to_string()),
            "existencia" => {
                edit.existencia = Some(
                    value
                        .parse()
                        .with_context(|| format!("existencia {} is not a whole number", value))?,
                )
            }
            "cpm" => edit.cpm = Some(parse_cpm(value)?),
            "presentacion" => edit.presentacion = Some(value.to_string()),
            "caducidad" | "fecha_caducidad" => edit.fecha_caducidad = Some(parse_date(value)?),
            other => bail!("Unknown lot field {}", other),
        }
    }

    if edit.is_empty() {
        bail!("Nothing to change");
    }
    Ok(edit)
}

fn optional(value: String) -> Option<String> {
    Some(value).filter(|v| !v.is_empty())
}

fn set_entry_field(header: &mut EntryHeader, field: &str, value: String) -> Result<()> {
    match field {
        "folio" => header.folio = value,
        "fecha" => header.fecha = parse_date(&value)?,
        "tipo_entrada" => header.tipo_entrada = value.to_uppercase(),
        "almacen" => header.almacen = optional(value),
        "institucion" => header.institucion = optional(value),
        "fuente_financiamiento" => header.fuente_financiamiento = value,
        "contrato" => header.contrato = value,
        "proceso" => header.proceso = value,
        "recibido_por" => header.recibido_por = value,
        other => bail!("Unknown entry field {}", other),
    }
    Ok(())
}

fn set_dispense_field(header: &mut DispenseHeader, field: &str, value: String) -> Result<()> {
    match field {
        "paciente_curp" | "curp" => header.paciente_curp = normalize_curp(&value),
        "paciente_nombre" | "nombre" => header.paciente_nombre = value,
        "paciente_nacimiento" | "nacimiento" => header.paciente_nacimiento = parse_date(&value)?,
        "receta_origen" => header.receta_origen = value,
        "receta_folio" => header.receta_folio = value,
        other => bail!("Unknown dispense field {}", other),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(s: &str) -> Vec<String> {
        s.split_whitespace().map(String::from).collect()
    }

    #[test]
    fn entry_input_from_words() {
        let input = entry_input(&words("A1 2027-01-31 10.50 3 CAJA CON 10")).unwrap();
        assert_eq!(input.lote, "A1");
        assert_eq!(input.presentacion, "CAJA CON 10");
        assert_eq!(input.precio_unitario, Some("10.50".parse().unwrap()));

        let input = entry_input(&words("A1 2027-01-31 10 3")).unwrap();
        assert_eq!(input.presentacion, "UNIDAD");

        assert!(entry_input(&words("A1 2027-01-31")).is_err());
        assert!(entry_input(&words("A1 31/01/2027 1 3")).is_err());
    }

    #[test]
    fn bad_quantity_reads_as_invalid_quantity() {
        let err = parse_quantity("tres").unwrap_err();
        assert_eq!(
            err.downcast_ref::<RejectReason>(),
            Some(&RejectReason::InvalidQuantity)
        );
        assert_eq!(parse_quantity("-2").unwrap(), -2);
    }

    #[test]
    fn lot_changes_become_an_edit() {
        let edit = lot_edit(&words("existencia=40 CADUCIDAD=2027-03-31 cpm=12")).unwrap();
        assert_eq!(edit.existencia, Some(40));
        assert_eq!(edit.cpm, Some(12));
        assert_eq!(edit.fecha_caducidad, NaiveDate::from_ymd_opt(2027, 3, 31));

        assert_eq!(
            lot_edit(&words("cpm=-1")).unwrap_err().downcast_ref::<RejectReason>(),
            Some(&RejectReason::InvalidCpm)
        );
        assert!(lot_edit(&words("existencia=muchos")).is_err());
        assert!(lot_edit(&words("color=rojo")).is_err());
        assert!(lot_edit(&words("codigo=")).is_err());
    }

    #[test]
    fn alert_line_names_the_level() {
        assert_eq!(alert_line(30, 120), "Stock 30 is 25.0% of CPM: critical");
        assert_eq!(alert_line(90, 120), "Stock 90 is 75.0% of CPM: low");
        assert_eq!(alert_line(9, 0), "Stock 9 with no CPM: sufficient");
    }

    #[test]
    fn header_fields_are_settable() {
        let mut header = EntryHeader::default();
        set_entry_field(&mut header, "tipo_entrada", "transferencia".to_string()).unwrap();
        set_entry_field(&mut header, "almacen", String::new()).unwrap();
        assert!(header.is_transfer());
        assert_eq!(header.almacen, None);
        assert!(set_entry_field(&mut header, "color", "rojo".to_string()).is_err());

        let mut header = DispenseHeader {
            paciente_curp: String::new(),
            paciente_nombre: String::new(),
            paciente_nacimiento: NaiveDate::from_ymd_opt(2000, 1, 1).unwrap(),
            receta_origen: String::new(),
            receta_folio: String::new(),
        };
        set_dispense_field(&mut header, "curp", " gode561231hdfrrn09".to_string()).unwrap();
        assert_eq!(header.paciente_curp, "GODE561231HDFRRN09");
    }
}
