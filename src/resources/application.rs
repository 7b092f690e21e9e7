//! `nebraska_application`.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{require_id, ResourceHandler, CREATED_TS_DESCRIPTION};
use crate::api::{AppConfig, Application};
use crate::auth::Session;
use crate::error::ProviderResult;
use crate::schema::{Attribute, Schema, Validator};

/// Type name of the resource and data source.
pub const TYPE_NAME: &str = "nebraska_application";

/// Attributes of an application.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApplicationState {
    /// Server assigned id.
    pub id: Option<String>,
    /// Display name. Computed in the data source.
    #[serde(default)]
    pub name: String,
    /// Reverse domain product id; the data source lookup key.
    pub product_id: String,
    /// Free-form description.
    pub description: Option<String>,
    /// Creation timestamp as rendered by the server.
    pub created_ts: Option<String>,
}

impl ApplicationState {
    /// Request body for create and update.
    pub fn to_config(&self) -> AppConfig {
        AppConfig {
            name: self.name.clone(),
            description: self.description.clone(),
            product_id: Some(self.product_id.clone()),
        }
    }

    /// Overwrite the state with what the server returned.
    pub fn apply(&mut self, app: Application) {
        self.id = Some(app.id);
        self.name = app.name;
        self.description = Some(app.description);
        if let Some(product_id) = app.product_id {
            self.product_id = product_id;
        }
        self.created_ts = Some(app.created_ts.to_string());
    }
}

/// Handler for `nebraska_application`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApplicationResource;

#[async_trait::async_trait]
impl ResourceHandler for ApplicationResource {
    type State = ApplicationState;

    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    fn resource_schema(&self) -> Schema {
        Schema::v0()
            .with_description("An application registered in Nebraska.")
            .with_attribute(
                "id",
                Attribute::computed_string().with_description("Server assigned id."),
            )
            .with_attribute(
                "name",
                Attribute::required_string()
                    .with_description("Name of the application.")
                    .with_validator(Validator::NotEmpty),
            )
            .with_attribute(
                "product_id",
                Attribute::required_string()
                    .with_description("Reverse domain product id, e.g. `io.example.App`.")
                    .with_validator(Validator::ProductId),
            )
            .with_attribute(
                "description",
                Attribute::optional_string().with_description("Description of the application."),
            )
            .with_attribute(
                "created_ts",
                Attribute::computed_string().with_description(CREATED_TS_DESCRIPTION),
            )
    }

    fn data_source_schema(&self) -> Schema {
        Schema::v0()
            .with_description("Look up an application by product id.")
            .with_attribute(
                "product_id",
                Attribute::required_string().with_description("Product id of the application."),
            )
            .with_attribute("id", Attribute::computed_string())
            .with_attribute("name", Attribute::computed_string())
            .with_attribute("description", Attribute::computed_string())
            .with_attribute(
                "created_ts",
                Attribute::computed_string().with_description(CREATED_TS_DESCRIPTION),
            )
    }

    async fn create(&self, session: &Session, mut planned: ApplicationState) -> ProviderResult<ApplicationState> {
        let app = session
            .api()
            .create_app(&planned.to_config(), session.editors())
            .await?;
        debug!(id = %app.id, "created application");
        planned.apply(app);
        Ok(planned)
    }

    async fn read(&self, session: &Session, current: ApplicationState) -> ProviderResult<ApplicationState> {
        self.read_data_source(session, current).await
    }

    async fn update(
        &self,
        session: &Session,
        prior: ApplicationState,
        mut planned: ApplicationState,
    ) -> ProviderResult<ApplicationState> {
        let id = require_id(TYPE_NAME, &prior.id)?;
        let app = session
            .api()
            .update_app(id, &planned.to_config(), session.editors())
            .await?;
        planned.apply(app);
        Ok(planned)
    }

    async fn delete(&self, session: &Session, current: ApplicationState) -> ProviderResult<()> {
        let id = require_id(TYPE_NAME, &current.id)?;
        session.api().delete_app(id, session.editors()).await
    }

    async fn read_data_source(
        &self,
        session: &Session,
        mut config: ApplicationState,
    ) -> ProviderResult<ApplicationState> {
        let app = session
            .api()
            .get_app(&config.product_id, session.editors())
            .await?;
        config.apply(app);
        Ok(config)
    }
}
