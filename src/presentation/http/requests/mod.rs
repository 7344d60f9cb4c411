use poem_openapi::Object;

#[derive(Object, Debug)]
pub struct SnoozeStepDto {
    #[oai(validator(min_length = 1, max_length = 4096))]
    pub text: String,
    /// Days after the previous step (after now for the first step).
    #[oai(validator(minimum(value = "0"), maximum(value = "365")))]
    pub offset_days: u32,
}

#[derive(Object, Debug)]
pub struct CreateSnoozeRequestDto {
    #[oai(validator(min_length = 1))]
    pub workspace_id: String,
    #[oai(validator(min_length = 1))]
    pub conversation_id: String,
    #[oai(validator(min_length = 1))]
    pub admin_id: String,
    #[oai(validator(min_items = 1, max_items = 30))]
    pub steps: Vec<SnoozeStepDto>,
    #[oai(default)]
    pub close_conversation: bool,
}

#[derive(Object, Debug)]
pub struct CancelSnoozeRequestDto {
    #[oai(validator(min_length = 1))]
    pub workspace_id: String,
    #[oai(validator(min_length = 1))]
    pub conversation_id: String,
    #[oai(validator(min_length = 1))]
    pub admin_id: String,
}

#[derive(Object, Debug)]
pub struct RegisterWorkspaceRequestDto {
    #[oai(validator(min_length = 1))]
    pub access_token: String,
}
