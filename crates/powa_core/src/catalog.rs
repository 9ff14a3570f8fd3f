//! The POWA photo catalog: images and their tags.

use crate::collection::{Collection, IndexName, Item};
use crate::config::Config;
use crate::database::StorageLocation;
use crate::error::StoreResult;
use crate::schema::{IndexDefinition, SchemaDefinition, SchemaRegistry, StoreDefinition};
use crate::service::StorageService;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Store holding captured images.
pub const IMAGES: &str = "images";

/// Store holding tags attached to images.
pub const TAGS: &str = "tags";

/// A captured image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageDoc {
    /// Data URI or URL of the image.
    pub src: String,
    /// Display title.
    pub title: String,
}

/// A tag on an image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagDoc {
    /// Key of the tagged image in [`IMAGES`].
    pub image_key: String,
    /// Tag text.
    pub value: String,
}

/// Indexes of the [`TAGS`] store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagIndex {
    /// Tags by image key.
    ImageKey,
    /// Tags by text.
    ValueKey,
}

impl IndexName for TagIndex {
    fn name(self) -> &'static str {
        match self {
            Self::ImageKey => "imageKey",
            Self::ValueKey => "valueKey",
        }
    }
}

/// Version 1 of the catalog schema.
pub fn powa_schema() -> StoreResult<SchemaDefinition> {
    SchemaDefinition::new(
        1,
        vec![
            StoreDefinition::new(IMAGES),
            StoreDefinition::new(TAGS)
                .with_index(IndexDefinition::new(TagIndex::ImageKey.name(), "imageKey"))
                .with_index(IndexDefinition::new(TagIndex::ValueKey.name(), "value")),
        ],
    )
}

/// The image and tag collections of one database.
#[derive(Clone)]
pub struct Catalog {
    images: Collection<ImageDoc>,
    tags: Collection<TagDoc, TagIndex>,
}

impl Catalog {
    /// Binds the catalog to a service whose registry includes [`powa_schema`].
    pub fn new(service: StorageService) -> Self {
        Self {
            images: Collection::new(service.clone(), IMAGES),
            tags: Collection::new(service, TAGS),
        }
    }

    /// Builds the service for the catalog schema and binds to it.
    pub fn open(config: Config, location: StorageLocation) -> StoreResult<Self> {
        let registry = SchemaRegistry::new().with(powa_schema()?);
        Ok(Self::new(StorageService::new(config, registry, location)))
    }

    /// The images collection.
    pub fn images(&self) -> &Collection<ImageDoc> {
        &self.images
    }

    /// The tags collection.
    pub fn tags(&self) -> &Collection<TagDoc, TagIndex> {
        &self.tags
    }

    /// Stores a new image under a fresh key and returns the key.
    pub async fn add_image(&self, src: &str, title: &str) -> StoreResult<String> {
        let key = Uuid::new_v4().to_string();
        let image = ImageDoc {
            src: src.to_string(),
            title: title.to_string(),
        };
        self.images.add(&key, &image).await?;
        Ok(key)
    }

    /// Replaces an image's title. Returns `false` if the image does not exist.
    pub async fn update_title(&self, key: &str, title: &str) -> StoreResult<bool> {
        let Some(mut image) = self.images.get_by_id(key).await? else {
            return Ok(false);
        };
        image.title = title.to_string();
        self.images.put(key, &image).await?;
        Ok(true)
    }

    /// All images in key order.
    pub async fn list_images(&self) -> StoreResult<Vec<Item<ImageDoc>>> {
        self.images.get().await
    }

    /// Deletes an image. Its tags are left in place.
    pub async fn remove_image(&self, key: &str) -> StoreResult<()> {
        self.images.remove(key).await
    }

    /// Tags an image and returns the new tag's key.
    pub async fn add_tag(&self, image_key: &str, value: &str) -> StoreResult<String> {
        let key = Uuid::new_v4().to_string();
        let tag = TagDoc {
            image_key: image_key.to_string(),
            value: value.to_string(),
        };
        self.tags.add(&key, &tag).await?;
        Ok(key)
    }

    /// Tags attached to an image.
    pub async fn tags_for_image(&self, image_key: &str) -> StoreResult<Vec<Item<TagDoc>>> {
        self.tags.get_by_index(TagIndex::ImageKey, image_key).await
    }

    /// Tags with the given text, across all images.
    pub async fn tags_with_value(&self, value: &str) -> StoreResult<Vec<Item<TagDoc>>> {
        self.tags.get_by_index(TagIndex::ValueKey, value).await
    }

    /// Deletes one tag.
    pub async fn remove_tag(&self, key: &str) -> StoreResult<()> {
        self.tags.remove(key).await
    }
}
