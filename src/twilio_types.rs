pub fn wrap_twiml(twiml: String) -> String {
    format!("<?xml version=\"1.0\" encoding=\"UTF-8\"?>{twiml}")
}

mod twiml {
    use xmlserde_derives::XmlSerialize;

    #[derive(PartialEq, Eq, XmlSerialize)]
    #[xmlserde(root = b"Response")]
    pub struct Response {
        #[xmlserde(ty = "untag")]
        pub actions: Vec<ResponseAction>,
    }

    #[derive(PartialEq, Eq, XmlSerialize)]
    pub enum ResponseAction {
        #[xmlserde(name = b"Play")]
        Play(PlayAction),
    }

    #[derive(PartialEq, Eq, XmlSerialize, Default)]
    pub struct PlayAction {
        #[xmlserde(ty = "text")]
        pub url: String,
    }

    /// TwiML whose entire content is playing the audio at `url` once.
    pub fn play_twiml(url: &str) -> String {
        let play_action = PlayAction {
            url: url.to_string(),
        };
        let response = Response {
            actions: vec![ResponseAction::Play(play_action)],
        };
        super::wrap_twiml(xmlserde::xml_serialize(response))
    }
}
pub use twiml::*;

mod calls {
    use serde::Deserialize;

    #[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
    #[serde(rename_all = "kebab-case")]
    pub enum CallStatus {
        Queued,
        Initiated,
        Ringing,
        InProgress,
        Completed,
        Busy,
        Failed,
        NoAnswer,
        Canceled,
    }

    /// The subset of the Calls API resource we read back after creating a call.
    #[derive(Deserialize, Debug)]
    pub struct CallResource {
        pub sid: Option<String>,
        pub status: CallStatus,
        pub to: String,
    }

    /// Body of a non-2xx Twilio REST response.
    #[derive(Deserialize, Debug)]
    pub struct TwilioApiError {
        pub code: Option<u32>,
        pub message: String,
    }
}
pub use calls::*;
