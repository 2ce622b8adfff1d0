//! HTTP API handlers for bb-server

pub mod assets;
pub mod auth;
pub mod buildinfo;
pub mod comparisons;
pub mod experiments;
pub mod folders;
pub mod generations;
pub mod health;
pub mod projects;
pub mod prompts;
pub mod sse;
pub mod workflows;

pub use assets::{
    create_text_asset, delete_asset, get_asset, get_asset_content, list_assets, update_asset,
    upload_asset,
};
pub use auth::{auth_middleware, CurrentUser};
pub use buildinfo::get_build_info;
pub use comparisons::{
    create_comparison, delete_comparison, get_comparison, list_comparisons,
    record_comparison_result, run_comparison,
};
pub use experiments::{
    add_experiment_asset, create_experiment, delete_experiment, get_experiment, list_experiments,
    remove_experiment_asset, update_experiment,
};
pub use folders::{create_folder, delete_folder, get_folder, list_folders, update_folder};
pub use generations::{cancel_generation, get_generation, list_generations, submit_generation};
pub use health::health_routes;
pub use projects::{create_project, delete_project, get_project, list_projects, update_project};
pub use prompts::{create_prompt, delete_prompt, get_prompt, list_prompts, update_prompt, use_prompt};
pub use sse::event_stream;
pub use workflows::{
    create_workflow, delete_workflow, get_workflow, list_workflows, update_workflow, use_workflow,
};
